use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use fastagi::{DialplanBreak, FastAgi};
use lyra_db::api::{ConnectionPool, PgConn};
use tokio::net::{TcpSocket, TcpStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::handler::HandlerRegistry;

const REQUEST_BACKLOG: u32 = 20;
/// Dialplan location the caller is diverted to when a request fails.
const FAILURE_EXTENSION: &str = "agi_fail,s,1";

pub struct Server {
    // fixed at first setup, a reload does not rebind
    listen_address: String,
    listen_port: u16,
    pool: ConnectionPool,
    registry: Arc<HandlerRegistry>,
}

impl Server {
    /// Bootstraps the connection pool before any request is accepted,
    /// retrying the database for up to five minutes.
    pub async fn new(config: Config, registry: Arc<HandlerRegistry>) -> Result<Arc<Server>> {
        info!("lyra-agid starting...");
        let pool = ConnectionPool::new();
        pool.reload(config.connection_pool_size, &config.db_uri).await?;
        Ok(Arc::new(Server {
            listen_address: config.listen_address,
            listen_port: config.listen_port,
            pool,
            registry,
        }))
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.setup_handlers().await?;
        self.clone().spawn_reload_task()?;

        let addr: SocketAddr =
            format!("{}:{}", self.listen_address, self.listen_port).parse()?;
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(REQUEST_BACKLOG)?;
        info!("listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(stream).await;
                    });
                }
                Err(e) => warn!("accept error: {}", e),
            }
        }
    }

    async fn setup_handlers(&self) -> Result<()> {
        debug!("list of handlers: {}", self.registry.names().join(", "));
        let mut conn = self.pool.acquire().await?;
        let result: Result<()> = async {
            let tx = conn.client.transaction().await?;
            for handler in self.registry.handlers() {
                handler.setup(&tx).await?;
            }
            tx.commit().await?;
            Ok(())
        }
        .await;
        self.pool.release(conn).await;
        result
    }

    /// SIGHUP only feeds a command channel; the reload itself runs on its
    /// own task, concurrently with in-flight request handling.
    fn spawn_reload_task(self: Arc<Self>) -> Result<()> {
        let (sender, mut receiver) = mpsc::channel::<()>(1);
        let mut hangup = signal(SignalKind::hangup())?;
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                let _ = sender.try_send(());
            }
        });
        tokio::spawn(async move {
            while receiver.recv().await.is_some() {
                if let Err(e) = self.reload().await {
                    // the retry budget is exhausted, do not keep serving
                    // without a database
                    error!("reload failed: {:?}", e);
                    std::process::exit(1);
                }
            }
        });
        Ok(())
    }

    /// Re-reads the configuration, re-bootstraps the pool and re-runs
    /// every handler setup. The listen address and port stay as they were
    /// at first setup.
    pub async fn reload(&self) -> Result<()> {
        debug!("reloading core engine");
        let config = Config::load()?;
        self.pool
            .reload(config.connection_pool_size, &config.db_uri)
            .await?;

        let mut conn = self.pool.acquire().await?;
        let result: Result<()> = async {
            let tx = conn.client.transaction().await?;
            debug!("reloading handlers");
            for handler in self.registry.handlers() {
                handler.reload(&tx).await;
            }
            tx.commit().await?;
            Ok(())
        }
        .await;
        self.pool.release(conn).await;
        debug!("finished reload");
        result
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream) {
        debug!("handling request");
        let (reader, writer) = stream.into_split();
        let mut agi = match FastAgi::new(reader, writer).await {
            Ok(agi) => agi,
            Err(e) => {
                warn!("could not read agi request: {}", e);
                return;
            }
        };

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("could not acquire a database connection: {:?}", e);
                relay_failure(&mut agi).await;
                return;
            }
        };
        let result = self.dispatch(&mut agi, &mut conn).await;
        self.pool.release(conn).await;
        report_result(&mut agi, result).await;
    }

    async fn dispatch(&self, agi: &mut FastAgi, conn: &mut PgConn) -> Result<String> {
        let handler_name = agi
            .network_script()
            .ok_or_else(|| anyhow!("request has no agi_network_script"))?
            .to_string();
        debug!("delegating request handling {:?}", handler_name);
        let handler = self
            .registry
            .get(&handler_name)
            .ok_or_else(|| anyhow!("no handler registered under {:?}", handler_name))?;

        let args = agi.args.clone();
        let tx = conn.client.transaction().await?;
        handler.execute(agi, &tx, &args).await?;
        tx.commit().await?;
        Ok(handler_name)
    }
}

/// Reports the request outcome to the switch. Failures are relayed best
/// effort: if that fails too the peer is already gone and we give up.
async fn report_result(agi: &mut FastAgi, result: Result<String>) {
    match result {
        Ok(handler_name) => {
            let _ = agi
                .verbose(&format!("AGI handler {:?} successfully executed", handler_name))
                .await;
            debug!("request successfully handled");
        }
        Err(e) => match e.downcast_ref::<DialplanBreak>() {
            Some(DialplanBreak(message)) => {
                info!("invalid request, dial plan broken");
                let _ = agi.verbose(message).await;
                relay_failure(agi).await;
            }
            None => {
                error!("unexpected exception: {:?}", e);
                relay_failure(agi).await;
            }
        },
    }
}

async fn relay_failure(agi: &mut FastAgi) {
    let _ = agi.appexec("Goto", FAILURE_EXTENSION).await;
    let _ = agi.fail().await;
}
