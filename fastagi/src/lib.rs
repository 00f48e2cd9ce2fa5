//! FastAGI protocol channel between the dialplan and the daemon.
//!
//! The switch opens a TCP connection, sends an `agi_*` environment block
//! terminated by an empty line, then waits for commands. Every command is
//! answered with a `200 result=...` line on the same stream.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// A handler decided the call cannot proceed and the dialplan has to
/// divert. This is an expected outcome, not a fault.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DialplanBreak(pub String);

/// Shorthand used by handlers to bail out of request handling.
pub fn dp_break(message: impl Into<String>) -> anyhow::Error {
    DialplanBreak(message.into()).into()
}

#[derive(Debug, Error)]
pub enum AgiError {
    #[error("agi command rejected with code {0}: {1}")]
    Command(u16, String),

    #[error("malformed agi response {0:?}")]
    MalformedResponse(String),
}

#[derive(Debug)]
struct AgiResponse {
    result: i64,
    extra: Option<String>,
}

impl AgiResponse {
    fn parse(line: &str) -> Result<Self> {
        let malformed = || AgiError::MalformedResponse(line.to_string());
        let (code, rest) = line.split_once(' ').ok_or_else(malformed)?;
        let code: u16 = code.parse().map_err(|_| malformed())?;
        if code != 200 {
            return Err(AgiError::Command(code, rest.to_string()).into());
        }
        let rest = rest.strip_prefix("result=").ok_or_else(malformed)?;
        let (result, extra) = match rest.split_once(' ') {
            Some((result, extra)) => (result, Some(extra.to_string())),
            None => (rest, None),
        };
        let result = result.parse().map_err(|_| malformed())?;
        Ok(Self { result, extra })
    }
}

pub struct FastAgi {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub env: HashMap<String, String>,
    pub args: Vec<String>,
}

impl FastAgi {
    /// Reads the request envelope off the stream. Fails if the peer hangs
    /// up before the empty line ending the environment block.
    pub async fn new<R, W>(reader: R, writer: W) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut reader = BufReader::new(Box::new(reader) as Box<dyn AsyncRead + Send + Unpin>);
        let mut env = HashMap::new();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(anyhow!("connection closed while reading agi environment"));
            }
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                env.insert(key.to_string(), value.trim_start().to_string());
            }
        }

        let mut args = Vec::new();
        for n in 1.. {
            match env.get(&format!("agi_arg_{}", n)) {
                Some(arg) => args.push(arg.clone()),
                None => break,
            }
        }

        Ok(Self {
            reader,
            writer: Box::new(writer),
            env,
            args,
        })
    }

    /// The handler name the dialplan asked for, from the request URI path.
    pub fn network_script(&self) -> Option<&str> {
        self.env.get("agi_network_script").map(|name| name.as_str())
    }

    pub async fn get_variable(&mut self, name: &str) -> Result<String> {
        let response = self
            .send_command(&format!("GET VARIABLE {}", quote(name)))
            .await?;
        match response.extra {
            Some(extra) if response.result == 1 => Ok(extra
                .trim_start_matches('(')
                .trim_end_matches(')')
                .to_string()),
            _ => Ok(String::new()),
        }
    }

    pub async fn set_variable(&mut self, name: &str, value: &str) -> Result<()> {
        self.send_command(&format!("SET VARIABLE {} {}", quote(name), quote(value)))
            .await?;
        Ok(())
    }

    pub async fn verbose(&mut self, message: &str) -> Result<()> {
        self.send_command(&format!("VERBOSE {} 1", quote(message)))
            .await?;
        Ok(())
    }

    /// Runs a dialplan application by name, e.g. `Goto` or `UserEvent`.
    pub async fn appexec(&mut self, application: &str, options: &str) -> Result<i64> {
        let response = self
            .send_command(&format!("EXEC {} {}", application, quote(options)))
            .await?;
        if response.result == -2 {
            return Err(anyhow!("no application {:?} to execute", application));
        }
        Ok(response.result)
    }

    /// Marks the AGI result as a failure. The switch only flips the result
    /// state on an invalid command, so an invalid command is what gets sent,
    /// and the rejection it answers with is expected.
    pub async fn fail(&mut self) -> Result<()> {
        let _ = self.send_command("FAILURE").await;
        Ok(())
    }

    async fn send_command(&mut self, command: &str) -> Result<AgiResponse> {
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(anyhow!("connection closed while reading agi response"));
        }
        AgiResponse::parse(line.trim_end_matches(&['\r', '\n'][..]))
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\"").replace('\n', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    const ENV: &str = "agi_request: agi://127.0.0.1/check_schedule\n\
                       agi_channel: PJSIP/abc-00000001\n\
                       agi_uniqueid: 1714987391.12\n\
                       agi_network_script: check_schedule\n\
                       agi_arg_1: tenant\n\
                       agi_arg_2: 1002\n\
                       \n";

    async fn agi_with_responses(responses: &str) -> (FastAgi, tokio::io::DuplexStream) {
        let (switch, daemon) = tokio::io::duplex(4096);
        let (mut switch_read, mut switch_write) = tokio::io::split(switch);
        switch_write.write_all(ENV.as_bytes()).await.unwrap();
        switch_write.write_all(responses.as_bytes()).await.unwrap();
        let (daemon_read, daemon_write) = tokio::io::split(daemon);
        let agi = FastAgi::new(daemon_read, daemon_write).await.unwrap();
        // hand back a readable end carrying whatever the daemon sent
        let (collect, mut sink) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let _ = tokio::io::copy(&mut switch_read, &mut sink).await;
        });
        (agi, collect)
    }

    async fn sent(collect: &mut tokio::io::DuplexStream, len: usize) -> String {
        let mut buf = vec![0u8; len];
        collect.read_exact(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn parses_the_request_envelope() {
        let (agi, _collect) = agi_with_responses("").await;
        assert_eq!(Some("check_schedule"), agi.network_script());
        assert_eq!(vec!["tenant".to_string(), "1002".to_string()], agi.args);
        assert_eq!("1714987391.12", agi.env["agi_uniqueid"]);
    }

    #[tokio::test]
    async fn get_variable_returns_the_parenthesized_value() {
        let (mut agi, mut collect) =
            agi_with_responses("200 result=1 (user)\n200 result=0\n").await;

        assert_eq!("user", agi.get_variable("LYRA_PATH").await.unwrap());
        let command = "GET VARIABLE \"LYRA_PATH\"\n";
        assert_eq!(command, sent(&mut collect, command.len()).await);

        // unset variables come back as an empty string
        assert_eq!("", agi.get_variable("LYRA_PATH_ID").await.unwrap());
    }

    #[tokio::test]
    async fn set_variable_quotes_name_and_value() {
        let (mut agi, mut collect) = agi_with_responses("200 result=1\n").await;
        agi.set_variable("LYRA_SCHEDULE_STATUS", "closed").await.unwrap();
        let command = "SET VARIABLE \"LYRA_SCHEDULE_STATUS\" \"closed\"\n";
        assert_eq!(command, sent(&mut collect, command.len()).await);
    }

    #[tokio::test]
    async fn appexec_reports_missing_applications() {
        let (mut agi, _collect) = agi_with_responses("200 result=-2\n").await;
        assert!(agi.appexec("NoSuchApp", "x").await.is_err());
    }

    #[tokio::test]
    async fn fail_tolerates_the_rejection_it_provokes() {
        let (mut agi, mut collect) =
            agi_with_responses("510 Invalid or unknown command\n").await;
        agi.fail().await.unwrap();
        assert_eq!("FAILURE\n", sent(&mut collect, 8).await);
    }

    #[tokio::test]
    async fn truncated_environment_is_an_error() {
        let (mut switch, daemon) = tokio::io::duplex(4096);
        switch
            .write_all(b"agi_network_script: check_schedule\n")
            .await
            .unwrap();
        // hang up before the blank line ending the environment
        drop(switch);
        let (daemon_read, daemon_write) = tokio::io::split(daemon);
        assert!(FastAgi::new(daemon_read, daemon_write).await.is_err());
    }

    #[test]
    fn response_parsing() {
        let response = AgiResponse::parse("200 result=1 (hello)").unwrap();
        assert_eq!(1, response.result);
        assert_eq!(Some("(hello)".to_string()), response.extra);

        let response = AgiResponse::parse("200 result=-1").unwrap();
        assert_eq!(-1, response.result);

        assert!(AgiResponse::parse("garbage").is_err());
        assert!(AgiResponse::parse("510 Invalid or unknown command").is_err());
    }
}
