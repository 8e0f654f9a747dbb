//! Configuration: CLI defaults optionally overridden by a Corefile-style file
//!
//! ```text
//! .:5353 {
//!     hosts /etc/hosts
//!     reload 30s 15s
//!     prometheus :9153
//!     log
//! }
//! ```

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadConfig {
    pub interval: Duration,
    pub jitter: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(30), jitter: Duration::from_secs(15) }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub listen: SocketAddr,
    pub hosts_path: PathBuf,
    pub reload: Option<ReloadConfig>,
    pub metrics_addr: Option<String>,
    pub log_queries: bool,
}

#[derive(Debug, PartialEq)]
enum Token { Text(String), OpenBrace, CloseBrace, Newline }

impl Config {
    pub fn new(listen: SocketAddr, hosts_path: impl Into<PathBuf>) -> Self {
        Self { listen, hosts_path: hosts_path.into(), reload: None, metrics_addr: None, log_queries: false }
    }

    /// Load a configuration file, starting from `base` for anything it omits.
    pub fn load(path: &str, base: Config) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::parse(&content, base)
    }

    pub fn parse(content: &str, base: Config) -> Result<Self> {
        let tokens = Self::lex(content);
        let (zone, directives) = Self::parse_tokens(&tokens)?;
        if zone.is_empty() {
            anyhow::bail!("Server block needs a zone name, e.g. '.:53'");
        }
        let mut cfg = base;

        if let Some(idx) = zone.rfind(':') {
            let port: u16 = zone[idx + 1..]
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid port in server block '{}'", zone))?;
            cfg.listen.set_port(port);
        }

        for d in directives {
            match d.name.as_str() {
                "hosts" => {
                    let path = d.args.first().ok_or_else(|| anyhow::anyhow!("'hosts' needs a file path"))?;
                    cfg.hosts_path = PathBuf::from(path);
                }
                "reload" => cfg.reload = Some(Self::reload_from(&d.args)?),
                "prometheus" => {
                    let mut addr = d.args.first().cloned().unwrap_or_else(|| ":9153".to_string());
                    if !addr.contains(':') { addr = format!(":{}", addr); }
                    if addr.starts_with(':') { addr = format!("0.0.0.0{}", addr); }
                    cfg.metrics_addr = Some(addr);
                }
                "log" => cfg.log_queries = true,
                other => anyhow::bail!("Unknown directive: {}", other),
            }
        }
        Ok(cfg)
    }

    fn reload_from(args: &[String]) -> Result<ReloadConfig> {
        let mut rc = ReloadConfig::default();
        if let Some(a) = args.first() {
            rc.interval = parse_duration(a)?.max(Duration::from_secs(2));
        }
        if let Some(a) = args.get(1) {
            rc.jitter = parse_duration(a)?.max(Duration::from_secs(1));
        }
        if rc.jitter > rc.interval / 2 { rc.jitter = rc.interval / 2; }
        Ok(rc)
    }

    fn lex(input: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut chars = input.chars().peekable();
        while let Some(&c) = chars.peek() {
            if c == '\n' { tokens.push(Token::Newline); chars.next(); }
            else if c.is_whitespace() { chars.next(); }
            else if c == '#' { while let Some(&c) = chars.peek() { if c == '\n' { break; } chars.next(); } }
            else if c == '{' { tokens.push(Token::OpenBrace); chars.next(); }
            else if c == '}' { tokens.push(Token::CloseBrace); chars.next(); }
            else if c == '"' {
                chars.next();
                let mut s = String::new();
                while let Some(&c) = chars.peek() { if c == '"' { chars.next(); break; } s.push(c); chars.next(); }
                tokens.push(Token::Text(s));
            } else {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '#' || c == '{' || c == '}' || c == '"' { break; }
                    s.push(c); chars.next();
                }
                tokens.push(Token::Text(s));
            }
        }
        tokens
    }

    /// Exactly one `<zone> { ... }` block is accepted.
    fn parse_tokens(tokens: &[Token]) -> Result<(String, Vec<Directive>)> {
        let mut i = 0;
        let mut zone = None;
        let mut block = None;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Text(s) if block.is_none() => { zone = Some(s.clone()); i += 1; }
                Token::OpenBrace if block.is_none() => {
                    let (directives, next_i) = Self::parse_block(tokens, i + 1)?;
                    block = Some(directives);
                    i = next_i;
                }
                Token::Newline => { i += 1; }
                _ => anyhow::bail!("Unexpected content after the server block"),
            }
        }
        match (zone, block) {
            (Some(zone), Some(directives)) => Ok((zone, directives)),
            _ => anyhow::bail!("Config must contain one '<zone> {{ ... }}' server block"),
        }
    }

    fn parse_block(tokens: &[Token], mut i: usize) -> Result<(Vec<Directive>, usize)> {
        let mut directives = Vec::new();
        while i < tokens.len() {
            match &tokens[i] {
                Token::Newline => { i += 1; }
                Token::CloseBrace => { return Ok((directives, i + 1)); }
                Token::Text(name) => {
                    let name = name.clone(); i += 1;
                    let mut args = Vec::new();
                    while let Some(Token::Text(arg)) = tokens.get(i) { args.push(arg.clone()); i += 1; }
                    directives.push(Directive { name, args });
                }
                Token::OpenBrace => anyhow::bail!("Nested blocks are not supported"),
            }
        }
        anyhow::bail!("Unterminated server block")
    }
}

pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix("ms") { Ok(Duration::from_millis(stripped.parse()?)) }
    else if let Some(stripped) = s.strip_suffix('s') { Ok(Duration::from_secs(stripped.parse()?)) }
    else if let Some(stripped) = s.strip_suffix('m') { Ok(Duration::from_secs(stripped.parse::<u64>()? * 60)) }
    else if let Some(stripped) = s.strip_suffix('h') { Ok(Duration::from_secs(stripped.parse::<u64>()? * 3600)) }
    else { anyhow::bail!("invalid duration '{}'", s) }
}
