//! CLI argument parsing, validation, and startup helpers.

use std::net::IpAddr;
use std::time::Duration;

use axum::http::HeaderMap;
use clap::Parser;
use tracing::{error, info, warn};

use crate::ServerConfig;
use crate::api::validation::validate_password;
use crate::auth::{CookieSettings, DEFAULT_EXEMPT_PATHS, SameSite};
use crate::db::{Database, NewUser, UserRole};
use crate::password::hash_password;
use crate::rate_limit::RateLimitConfig;

const MIN_JWT_SECRET_LENGTH: usize = 32;
/// One week.
const MAX_ACCESS_TOKEN_MINUTES: u64 = 7 * 24 * 60;
/// Ten years.
const MAX_REFRESH_TOKEN_DAYS: u64 = 3650;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Proxy header carrying the real client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    XForwardedFor,
    XRealIp,
    CfConnectingIp,
}

/// Reads the client IP from a trusted proxy header.
#[derive(Clone, Copy, Debug)]
pub struct IpExtractor {
    header: ClientIpHeader,
}

impl From<ClientIpHeader> for IpExtractor {
    fn from(header: ClientIpHeader) -> Self {
        Self { header }
    }
}

impl IpExtractor {
    fn header_name(&self) -> &'static str {
        match self.header {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
            ClientIpHeader::CfConnectingIp => "cf-connecting-ip",
        }
    }

    /// Read the client address from the request headers. X-Forwarded-For
    /// lists hops, the client is first.
    pub fn read(&self, headers: &HeaderMap) -> Result<IpAddr, &'static str> {
        let value = headers
            .get(self.header_name())
            .ok_or("IP header not present")?
            .to_str()
            .map_err(|_| "IP header contains invalid characters")?;
        let candidate = match self.header {
            ClientIpHeader::XForwardedFor => value.split(',').next().unwrap_or(""),
            ClientIpHeader::XRealIp | ClientIpHeader::CfConnectingIp => value,
        };
        candidate
            .trim()
            .parse()
            .map_err(|_| "IP header is not a valid address")
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Quillpost", about = "Blog publishing backend with cookie-based JWT sessions")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7300")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "quillpost.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Set the Secure flag on cookies (use behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// SameSite policy for cookies. `none` implies Secure
    #[arg(long, value_enum, default_value = "lax")]
    pub same_site: SameSite,

    /// Access token lifetime in minutes
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..=MAX_ACCESS_TOKEN_MINUTES))]
    pub access_token_minutes: u64,

    /// Refresh token lifetime in days
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..=MAX_REFRESH_TOKEN_DAYS))]
    pub refresh_token_days: u64,

    /// Issue a new refresh token on every silent refresh
    #[arg(long)]
    pub rotate_refresh_tokens: bool,

    /// Path prefix that skips the session gate. Repeat to add more; replaces the defaults
    #[arg(long = "auth-exempt-path", value_parser = validate_path_prefix)]
    pub auth_exempt_paths: Vec<String>,

    /// Read the client IP from this proxy header instead of the socket address
    #[arg(long, value_enum)]
    pub ip_header: Option<ClientIpHeader>,

    /// Disable new user signups (admins can still create users)
    #[arg(long)]
    pub no_signup: bool,

    /// Create an admin with this email on startup. Password is read from ADMIN_PASSWORD
    #[arg(long)]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_path_prefix(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("Path must start with '/': {}", s));
    }
    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace()) {
        return Err(format!("Path contains invalid characters: {}", s));
    }
    Ok(s.to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // SAFETY: still single-threaded during startup; nothing else reads this variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Derive a valid username from an email's local part.
fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let mut name: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .take(30)
        .collect();
    while name.len() < 4 {
        name.push('_');
    }
    name
}

/// Handle `--create-admin`: create an active admin unless the email is taken.
/// Exits the process on failure.
pub async fn handle_create_admin(db: &Database, email: &str) {
    let Ok(password) = std::env::var("ADMIN_PASSWORD") else {
        error!("--create-admin requires the ADMIN_PASSWORD environment variable");
        std::process::exit(1);
    };
    // SAFETY: still single-threaded during startup; nothing else reads this variable.
    unsafe { std::env::remove_var("ADMIN_PASSWORD") };

    if let Err(message) = validate_password(&password) {
        error!(reason = %message, "ADMIN_PASSWORD is too weak");
        std::process::exit(1);
    }

    match db.users().is_email_taken(email).await {
        Ok(true) => {
            warn!(email = %email, "User already exists, not creating admin");
            return;
        }
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing user");
            std::process::exit(1);
        }
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            std::process::exit(1);
        }
    };

    let username = username_from_email(email);
    let new_user = NewUser {
        email,
        username: &username,
        first_name: "",
        last_name: "",
        password_hash: &password_hash,
        role: UserRole::Admin,
    };

    match db.users().create(&new_user).await {
        Ok(id) => info!(user_id = id, email = %email, username = %username, "Admin user created"),
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    let exempt_paths = if args.auth_exempt_paths.is_empty() {
        DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect()
    } else {
        args.auth_exempt_paths.clone()
    };

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        cookies: CookieSettings::new(args.secure_cookies, args.same_site),
        access_token_lifetime: Duration::from_secs(args.access_token_minutes * 60),
        refresh_token_lifetime: Duration::from_secs(args.refresh_token_days * 24 * 60 * 60),
        rotate_refresh_tokens: args.rotate_refresh_tokens,
        exempt_paths,
        no_signup: args.no_signup,
        ip_extractor: args.ip_header.map(IpExtractor::from),
        rate_limits: RateLimitConfig::default(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["quillpost"]);
        assert_eq!(args.port, 7300);
        assert_eq!(args.database, "quillpost.db");
        assert_eq!(args.same_site, SameSite::Lax);
        assert_eq!(args.access_token_minutes, 5);
        assert_eq!(args.refresh_token_days, 1);
        assert!(args.auth_exempt_paths.is_empty());
        assert!(!args.rotate_refresh_tokens);
    }

    #[test]
    fn test_repeatable_exempt_paths() {
        let args = Args::parse_from([
            "quillpost",
            "--auth-exempt-path",
            "/health",
            "--auth-exempt-path",
            "/login/",
        ]);
        assert_eq!(args.auth_exempt_paths, vec!["/health", "/login/"]);
        assert!(Args::try_parse_from(["quillpost", "--auth-exempt-path", "health"]).is_err());
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        assert!(Args::try_parse_from(["quillpost", "--access-token-minutes", "0"]).is_err());
    }

    #[test]
    fn test_lifetimes_are_bounded() {
        assert!(Args::try_parse_from(["quillpost", "--access-token-minutes", "10081"]).is_err());
        assert!(Args::try_parse_from(["quillpost", "--refresh-token-days", "3651"]).is_err());
        assert!(
            Args::try_parse_from(["quillpost", "--refresh-token-days", "213503982334601"]).is_err()
        );

        let args = Args::parse_from([
            "quillpost",
            "--access-token-minutes",
            "10080",
            "--refresh-token-days",
            "3650",
        ]);
        assert_eq!(args.access_token_minutes, MAX_ACCESS_TOKEN_MINUTES);
        assert_eq!(args.refresh_token_days, MAX_REFRESH_TOKEN_DAYS);
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("jane.doe+blog@example.com"), "jane.doeblog");
        assert_eq!(username_from_email("al@example.com"), "al__");
    }

    #[test]
    fn test_ip_extractor_reads_configured_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " 198.51.100.4 , 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "::1".parse().unwrap());

        let xff = IpExtractor::from(ClientIpHeader::XForwardedFor);
        assert_eq!(xff.read(&headers).unwrap().to_string(), "198.51.100.4");

        let real = IpExtractor::from(ClientIpHeader::XRealIp);
        assert_eq!(real.read(&headers).unwrap().to_string(), "::1");

        let cf = IpExtractor::from(ClientIpHeader::CfConnectingIp);
        assert!(cf.read(&headers).is_err());

        headers.insert("x-forwarded-for", "".parse().unwrap());
        assert!(xff.read(&headers).is_err());
    }
}
