use lettre::message::Mailbox;
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use fairsplit_common::db::{self, Repository, StoreBackend};
use fairsplit_common::email::senders::{MockSender, SmtpSender};
use fairsplit_common::email::{EmailError, EmailSender};

pub static CONF: Lazy<Config> = Lazy::new(|| Config::from_env().expect("Failed to load config"));

const STORE_BACKEND_VAR: &str = "FAIRSPLIT_STORE_BACKEND";

const DB_USERNAME_VAR: &str = "FAIRSPLIT_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "FAIRSPLIT_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "FAIRSPLIT_DB_HOSTNAME";
const DB_PORT_VAR: &str = "FAIRSPLIT_DB_PORT";
const DB_NAME_VAR: &str = "FAIRSPLIT_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "FAIRSPLIT_DB_MAX_CONNECTIONS";

const EMAIL_ENABLED_VAR: &str = "FAIRSPLIT_EMAIL_ENABLED";
const EMAIL_FROM_ADDR_VAR: &str = "FAIRSPLIT_EMAIL_FROM_ADDR";
const EMAIL_REPLY_TO_ADDR_VAR: &str = "FAIRSPLIT_EMAIL_REPLY_TO_ADDR";
const SMTP_ADDRESS_VAR: &str = "FAIRSPLIT_SMTP_ADDRESS";
const SMTP_USERNAME_VAR: &str = "FAIRSPLIT_SMTP_USERNAME";
const SMTP_PASSWORD_VAR: &str = "FAIRSPLIT_SMTP_PASSWORD";

const INVITE_ACCEPT_URL_VAR: &str = "FAIRSPLIT_INVITE_ACCEPT_URL";

const LOG_LEVEL_VAR: &str = "FAIRSPLIT_LOG_LEVEL";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    Memory,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(BackendKind::Postgres),
            "memory" => Ok(BackendKind::Memory),
            _ => Err(()),
        }
    }
}

pub struct DbConfig {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub name: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn uri(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.hostname, self.port, self.name,
        )
    }
}

pub struct EmailConfig {
    pub from_address: Mailbox,
    pub reply_to_address: Mailbox,
    pub smtp_address: String,
    pub smtp_username: String,
    pub smtp_password: String,
}

pub struct Config {
    pub store_backend: BackendKind,
    /// Present when `store_backend` is `Postgres`.
    pub db: Option<DbConfig>,
    /// Present when outbound email is enabled.
    pub email: Option<EmailConfig>,
    pub invite_accept_url: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let store_backend = env_var_or(STORE_BACKEND_VAR, BackendKind::Memory);

        let db = match store_backend {
            BackendKind::Postgres => Some(DbConfig {
                username: env_var(DB_USERNAME_VAR)?,
                password: env_var(DB_PASSWORD_VAR)?,
                hostname: env_var(DB_HOSTNAME_VAR)?,
                port: env_var(DB_PORT_VAR)?,
                name: env_var(DB_NAME_VAR)?,
                max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 48),
            }),
            BackendKind::Memory => None,
        };

        let email_enabled = if cfg!(test) {
            false
        } else {
            env_var_or(EMAIL_ENABLED_VAR, false)
        };

        let email = if email_enabled {
            let from_address: Mailbox = env_var::<String>(EMAIL_FROM_ADDR_VAR)?
                .parse()
                .map_err(|_| ConfigError::invalid(EMAIL_FROM_ADDR_VAR))?;
            let reply_to_address: Mailbox = env_var::<String>(EMAIL_REPLY_TO_ADDR_VAR)?
                .parse()
                .map_err(|_| ConfigError::invalid(EMAIL_REPLY_TO_ADDR_VAR))?;

            Some(EmailConfig {
                from_address,
                reply_to_address,
                smtp_address: env_var(SMTP_ADDRESS_VAR)?,
                smtp_username: env_var(SMTP_USERNAME_VAR)?,
                smtp_password: env_var(SMTP_PASSWORD_VAR)?,
            })
        } else {
            None
        };

        Ok(Config {
            store_backend,
            db,
            email,
            invite_accept_url: env_var_or(
                INVITE_ACCEPT_URL_VAR,
                String::from("http://localhost/invites/accept"),
            ),
            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        })
    }
}

/// Builds the repository the config selects. Called once at process startup.
pub fn init_repository_from_env() -> Result<Arc<dyn Repository>, ConfigError> {
    let backend = match CONF.store_backend {
        BackendKind::Postgres => {
            let db = CONF.db.as_ref().ok_or(ConfigError::missing(DB_NAME_VAR))?;

            StoreBackend::Postgres {
                database_uri: db.uri(),
                max_db_connections: Some(db.max_connections),
            }
        }
        BackendKind::Memory => StoreBackend::Memory,
    };

    Ok(db::init_repository(backend))
}

/// An SMTP sender when email is configured; otherwise the mock, which only
/// records messages.
pub fn init_email_sender_from_env() -> Result<EmailSender, EmailError> {
    match &CONF.email {
        Some(email) => Ok(Arc::new(SmtpSender::new(
            &email.smtp_address,
            email.smtp_username.clone(),
            email.smtp_password.clone(),
        )?)),
        None => Ok(Arc::new(MockSender::new())),
    }
}

/// Wires the invite mailer from the email config. Without one, invitation
/// mail goes to the mock sender and is effectively dropped.
pub fn init_invite_mailer_from_env() -> Result<crate::service::budget::InviteMailer, ConfigError> {
    let sender = init_email_sender_from_env().map_err(|e| {
        log::error!("{e}");
        ConfigError::invalid(SMTP_ADDRESS_VAR)
    })?;

    let (from, reply_to) = match &CONF.email {
        Some(email) => (email.from_address.clone(), email.reply_to_address.clone()),
        None => {
            let from: Mailbox = "FairSplit <no-reply@localhost>"
                .parse()
                .map_err(|_| ConfigError::invalid(EMAIL_FROM_ADDR_VAR))?;
            (from.clone(), from)
        }
    };

    Ok(crate::service::budget::InviteMailer::new(
        sender,
        from,
        reply_to,
        CONF.invite_accept_url.clone(),
    ))
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::missing(key))?;
    let var: T = var.parse().map_err(|_| ConfigError::invalid(key))?;
    Ok(var)
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl ConfigError {
    fn missing(var_name: &'static str) -> Self {
        Self::MissingVar(var_name)
    }

    fn invalid(var_name: &'static str) -> Self {
        Self::InvalidVar(var_name)
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}
