//!
//! adl-token
//! ---------
//! Fetch, renew and cancel delegation tokens against the credential service,
//! and dry-run the configured authorizer. Connects as the OS login user;
//! `--proxy-user` impersonates another user through it.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use adl_auth::authz::{create_authorizer, AccessType};
use adl_auth::config::Configuration;
use adl_auth::identity::{Credential, Identity, StaticCredential, StaticIdentityProvider};
use adl_auth::token::{AuthenticatedTokenClient, RenewerRegistry, Token, TokenLifecycleCoordinator};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--conf <file.json>] [--proxy-user <user>] fetch --renewer <principal> [--out <file>]\n  {program} [--conf <file.json>] [--proxy-user <user>] renew --token <file>\n  {program} [--conf <file.json>] [--proxy-user <user>] cancel --token <file>\n  {program} [--conf <file.json>] check --access <type> <path>...\n\nFlags:\n  --conf <file>        Flat JSON configuration; ADL_* environment variables override it\n  --proxy-user <user>  Act on behalf of <user>; the login user connects\n  -h, --help           Show this help\n\nEnvironment:\n  ADL_AUTHORIZATION    Authorization header value to send (default: simple auth as the login user)\n  RUST_LOG             Log filter (default: info)"
    );
}

#[derive(Debug, Default)]
struct Args {
    conf: Option<PathBuf>,
    proxy_user: Option<String>,
    command: String,
    renewer: Option<String>,
    out: Option<PathBuf>,
    token: Option<PathBuf>,
    access: Option<String>,
    paths: Vec<String>,
}

fn parse_args(raw: &[String]) -> Result<Option<Args>> {
    let mut args = Args::default();
    let mut it = raw.iter();
    let value = |it: &mut std::slice::Iter<'_, String>, flag: &str| -> Result<String> {
        it.next().cloned().ok_or_else(|| anyhow!("{flag} needs a value"))
    };
    while let Some(a) = it.next() {
        match a.as_str() {
            "-h" | "--help" => return Ok(None),
            "--conf" => args.conf = Some(PathBuf::from(value(&mut it, a)?)),
            "--proxy-user" => args.proxy_user = Some(value(&mut it, a)?),
            "--renewer" => args.renewer = Some(value(&mut it, a)?),
            "--out" => args.out = Some(PathBuf::from(value(&mut it, a)?)),
            "--token" => args.token = Some(PathBuf::from(value(&mut it, a)?)),
            "--access" => args.access = Some(value(&mut it, a)?),
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            word if args.command.is_empty() => args.command = word.to_string(),
            path => args.paths.push(path.to_string()),
        }
    }
    if args.command.is_empty() {
        return Ok(None);
    }
    Ok(Some(args))
}

fn load_conf(args: &Args) -> Result<Configuration> {
    let base = match &args.conf {
        Some(p) => Configuration::load_json(p)?,
        None => Configuration::new(),
    };
    Ok(base.with_env_overrides())
}

fn login_identity(proxy_user: Option<&str>) -> Arc<Identity> {
    let user = whoami::username();
    let credential: Arc<dyn Credential> = match env::var("ADL_AUTHORIZATION") {
        Ok(header) if !header.trim().is_empty() => Arc::new(StaticCredential::header(user.clone(), header)),
        _ => Arc::new(StaticCredential::simple(user.clone())),
    };
    let login = Arc::new(Identity::new(user, credential));
    match proxy_user {
        Some(p) => Arc::new(Identity::proxy_for(p, login)),
        None => login,
    }
}

fn read_token(path: &PathBuf) -> Result<Token> {
    let text = fs::read_to_string(path).with_context(|| format!("reading token file {}", path.display()))?;
    Ok(Token::decode_from_url_string(&text)?)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let raw: Vec<String> = env::args().collect();
    let program = raw.first().cloned().unwrap_or_else(|| "adl-token".to_string());
    let Some(args) = parse_args(&raw[1.min(raw.len())..])? else {
        print_usage(&program);
        return Ok(());
    };
    let conf = load_conf(&args)?;

    if args.command == "check" {
        let access: AccessType = args.access.as_deref().ok_or_else(|| anyhow!("check needs --access"))?.parse()?;
        let paths: Vec<&str> = args.paths.iter().map(String::as_str).collect();
        match create_authorizer(&conf)? {
            None => println!("allowed (no authorizer configured)"),
            Some(gate) => {
                let ok = gate.is_authorized(access, &paths)?;
                println!("{}", if ok { "allowed" } else { "denied" });
            }
        }
        return Ok(());
    }

    let acting = login_identity(args.proxy_user.as_deref());
    info!(target: "adl_token", "acting as {}", acting);
    let coordinator = Arc::new(TokenLifecycleCoordinator::new(
        Arc::new(StaticIdentityProvider::new(acting)),
        AuthenticatedTokenClient::from_config(&conf)?,
    ));
    let registry = RenewerRegistry::with_delegation_renewer(Arc::clone(&coordinator));

    match args.command.as_str() {
        "fetch" => {
            let renewer = args.renewer.as_deref().ok_or_else(|| anyhow!("fetch needs --renewer"))?;
            let token = coordinator.retrieve(renewer, &conf)?;
            let encoded = token.encode_to_url_string()?;
            match &args.out {
                Some(p) => {
                    fs::write(p, &encoded).with_context(|| format!("writing {}", p.display()))?;
                    info!(target: "adl_token", "token written to {}", p.display());
                }
                None => println!("{encoded}"),
            }
        }
        "renew" => {
            let path = args.token.as_ref().ok_or_else(|| anyhow!("renew needs --token"))?;
            let expiry = read_token(path)?.renew(&registry, &conf)?;
            let when = chrono::DateTime::from_timestamp_millis(expiry)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| expiry.to_string());
            println!("renewed; expires {when}");
        }
        "cancel" => {
            let path = args.token.as_ref().ok_or_else(|| anyhow!("cancel needs --token"))?;
            read_token(path)?.cancel(&registry, &conf)?;
            println!("cancelled");
        }
        other => {
            print_usage(&program);
            bail!("unknown command '{other}'");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> { s.split_whitespace().map(str::to_string).collect() }

    #[test]
    fn parses_fetch_with_globals() {
        let a = parse_args(&argv("--conf c.json --proxy-user alice fetch --renewer yarn --out t.tok"))
            .unwrap()
            .unwrap();
        assert_eq!(a.command, "fetch");
        assert_eq!(a.proxy_user.as_deref(), Some("alice"));
        assert_eq!(a.renewer.as_deref(), Some("yarn"));
        assert_eq!(a.out, Some(PathBuf::from("t.tok")));
    }

    #[test]
    fn check_collects_paths() {
        let a = parse_args(&argv("check --access rename /a /b")).unwrap().unwrap();
        assert_eq!(a.paths, vec!["/a", "/b"]);
    }

    #[test]
    fn help_and_empty_print_usage() {
        assert!(parse_args(&argv("--help")).unwrap().is_none());
        assert!(parse_args(&[]).unwrap().is_none());
        assert!(parse_args(&argv("fetch --renewer")).is_err());
        assert!(parse_args(&argv("--bogus")).is_err());
    }
}
