use crate::reverse::convert_row;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use sync_core::{ConnectionError, ErrorDetail, QueryError, Row, RowSource};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 1433;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const APPLICATION_NAME: &str = "firestore-sync";

/// SQL Server connection options.
///
/// Field names follow the usual SQL Server client keywords so existing
/// settings files keep working.
#[derive(Clone, Deserialize)]
pub struct MssqlOpts {
    #[serde(alias = "host")]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Require an encrypted connection (default: true)
    #[serde(default = "default_true")]
    pub encrypt: bool,
    /// Accept any server certificate
    #[serde(default)]
    pub trust_server_cert: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl fmt::Debug for MssqlOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlOpts")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database", &self.database)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl MssqlOpts {
    /// `server:port/database`, used in diagnostics.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.server, self.port, self.database)
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.server);
        config.port(self.port);
        config.database(&self.database);
        config.application_name(APPLICATION_NAME);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));

        if self.encrypt {
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }
        if self.trust_server_cert {
            config.trust_cert();
        }
        config
    }
}

/// Split a tiberius error into `(code, message)` entries.
pub(crate) fn error_details(err: &tiberius::error::Error) -> Vec<ErrorDetail> {
    match err {
        tiberius::error::Error::Server(token) => {
            vec![ErrorDetail::new(Some(token.code()), token.message())]
        }
        other => vec![ErrorDetail::new(None, other.to_string())],
    }
}

/// A single open connection to SQL Server.
pub struct MssqlSource {
    client: Client<Compat<TcpStream>>,
    target: String,
}

impl MssqlSource {
    /// Open the connection. No retries: a rejected login or an unreachable
    /// server is reported with every backend error entry.
    pub async fn connect(opts: &MssqlOpts) -> Result<Self, ConnectionError> {
        let target = opts.target();
        debug!("Connecting to SQL Server at {target}");

        let timeout = Duration::from_secs(opts.connect_timeout_secs);
        let client = tokio::time::timeout(timeout, connect_client(opts.build_config()))
            .await
            .map_err(|_| {
                ConnectionError::message(
                    &target,
                    format!("timed out after {}s", opts.connect_timeout_secs),
                )
            })?
            .map_err(|details| ConnectionError::new(&target, details))?;

        info!("Connected to SQL Server: {target}");
        Ok(Self { client, target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<(), ConnectionError> {
        let target = self.target;
        self.client
            .close()
            .await
            .map_err(|e| ConnectionError::new(target, error_details(&e)))
    }
}

async fn connect_client(
    config: Config,
) -> Result<Client<Compat<TcpStream>>, Vec<ErrorDetail>> {
    let tcp = open_tcp(&config).await?;
    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL may redirect the login to another node.
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!("SQL Server redirected connection to {host}:{port}");
            let mut config = config;
            config.host(&host);
            config.port(port);
            let tcp = open_tcp(&config).await?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| error_details(&e))
        }
        Err(e) => Err(error_details(&e)),
    }
}

async fn open_tcp(config: &Config) -> Result<TcpStream, Vec<ErrorDetail>> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| vec![ErrorDetail::new(None, e.to_string())])?;
    tcp.set_nodelay(true).ok();
    Ok(tcp)
}

#[async_trait::async_trait]
impl RowSource for MssqlSource {
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, QueryError> {
        debug!("Executing SQL on {}: {}", self.target, sql);

        let stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| QueryError::new(sql, error_details(&e)))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| QueryError::new(sql, error_details(&e)))?;

        rows.into_iter()
            .map(|row| {
                convert_row(row)
                    .map_err(|e| QueryError::new(sql, vec![ErrorDetail::new(None, e.to_string())]))
            })
            .collect()
    }
}
