//! Lease persistence.
//!
//! Leases are recorded as human-readable blocks:
//!
//! ```text
//! lease {
//!   fixed-address 10.0.0.5;
//!   filename "pxelinux.0";
//!   option subnet_mask 255.255.255.0;
//!   option 224 ca:fe;
//!   renew 4 2026/10/15 12:00:00;
//!   rebind 4 2026/10/15 12:52:30;
//!   expire 4 2026/10/15 13:00:00;
//! }
//! ```
//!
//! Options with a known type are written by name, all the others by code
//! with a hex value, so that a parsed lease has exactly the options written.

use std::{
    fmt::Write as FmtWrite,
    fs,
    io::{self, Write},
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use chrono::{NaiveDateTime, TimeZone, Utc};

use dhcp_protocol::{OptionTag, Options};
use routing_core::Time;

use crate::{error::Error, lease::Lease, value};

const DATE_FORMAT: &str = "%w %Y/%m/%d %H:%M:%S";

/// Where the client records its leases.
pub trait LeaseDatabase {
    /// Every recorded lease, oldest first.
    fn load(&mut self) -> Result<Vec<Lease>, Error>;

    /// Records one more lease.
    fn append(&mut self, lease: &Lease) -> Result<(), Error>;

    /// Replaces the whole database with `leases`.
    fn rewrite(&mut self, leases: &[Lease]) -> Result<(), Error>;
}

/// A lease database in a text file.
#[derive(Debug, Clone)]
pub struct LeaseFile {
    path: PathBuf,
}

impl LeaseFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        LeaseFile {
            path: path.as_ref().to_owned(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LeaseDatabase for LeaseFile {
    fn load(&mut self) -> Result<Vec<Lease>, Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(ref error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        parse(&text)
    }

    fn append(&mut self, lease: &Lease) -> Result<(), Error> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(render(lease).as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn rewrite(&mut self, leases: &[Lease]) -> Result<(), Error> {
        let temporary = self.path.with_extension("new");
        let text: String = leases.iter().map(render).collect();
        fs::write(&temporary, text)?;
        fs::rename(&temporary, &self.path)?;
        debug!("Rewrote {} with {} leases", self.path.display(), leases.len());
        Ok(())
    }
}

/// A lease database kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseDatabase {
    leases: Vec<Lease>,
    appends: usize,
    rewrites: usize,
}

impl MemoryLeaseDatabase {
    pub fn new(leases: Vec<Lease>) -> Self {
        MemoryLeaseDatabase {
            leases,
            ..Default::default()
        }
    }

    pub fn leases(&self) -> &[Lease] {
        &self.leases
    }

    pub fn appends(&self) -> usize {
        self.appends
    }

    pub fn rewrites(&self) -> usize {
        self.rewrites
    }
}

impl LeaseDatabase for MemoryLeaseDatabase {
    fn load(&mut self) -> Result<Vec<Lease>, Error> {
        Ok(self.leases.clone())
    }

    fn append(&mut self, lease: &Lease) -> Result<(), Error> {
        self.appends += 1;
        self.leases.push(lease.clone());
        Ok(())
    }

    fn rewrite(&mut self, leases: &[Lease]) -> Result<(), Error> {
        self.rewrites += 1;
        self.leases = leases.to_vec();
        Ok(())
    }
}

/// Renders one `lease { }` block.
pub fn render(lease: &Lease) -> String {
    let mut text = String::new();
    // writing into a `String` cannot fail
    let _ = write_lease(&mut text, lease);
    text
}

fn write_lease(text: &mut String, lease: &Lease) -> std::fmt::Result {
    writeln!(text, "lease {{")?;
    writeln!(text, "  fixed-address {};", lease.address)?;
    if lease.is_bootp {
        writeln!(text, "  bootp;")?;
    }
    if let Some(ref medium) = lease.medium {
        writeln!(text, "  medium {};", quote(medium))?;
    }
    if !lease.server_name.is_empty() {
        writeln!(text, "  server-name {};", quote(&lease.server_name))?;
    }
    if !lease.boot_filename.is_empty() {
        writeln!(text, "  filename {};", quote(&lease.boot_filename))?;
    }
    for (code, option) in lease.options.iter() {
        match (OptionTag::name(code), value::format(code, option)) {
            (Some(name), Some(typed)) if is_text(code) => writeln!(text, "  option {} {};", name, quote(&typed))?,
            (Some(name), Some(typed)) => writeln!(text, "  option {} {};", name, typed)?,
            _ => writeln!(text, "  option {} {};", code, value::to_hex(option))?,
        }
    }
    writeln!(text, "  renew {};", date(lease.renewal))?;
    writeln!(text, "  rebind {};", date(lease.rebind))?;
    writeln!(text, "  expire {};", date(lease.expiry))?;
    writeln!(text, "}}")
}

fn is_text(code: u8) -> bool {
    code == OptionTag::Hostname as u8 || code == OptionTag::DomainName as u8 || code == OptionTag::DhcpMessage as u8
}

fn date(time: Time) -> String {
    match Utc.timestamp_opt(time.as_secs() as i64, 0).single() {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => "never".to_owned(),
    }
}

/// Quotes `text` on one line, control characters written as `\ooo`.
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for character in text.chars() {
        match character {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(character);
            }
            _ if character.is_control() => {
                let _ = write!(quoted, "\\{:03o}", u32::from(character));
            }
            _ => quoted.push(character),
        }
    }
    quoted.push('"');
    quoted
}

/// Parses every `lease { }` block of a lease file.
pub fn parse(text: &str) -> Result<Vec<Lease>, Error> {
    let mut leases = Vec::new();
    let mut current: Option<(Lease, bool)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let syntax = |reason: &str| Error::LeaseFileSyntax {
            line,
            reason: reason.to_owned(),
        };

        let statement = raw.trim();
        if statement.is_empty() || statement.starts_with('#') {
            continue;
        }

        let (lease, has_address) = match current {
            None if statement == "lease {" => {
                current = Some((empty_lease(), false));
                continue;
            }
            None => return Err(syntax("expected `lease {`")),
            Some(ref mut entry) => (&mut entry.0, &mut entry.1),
        };

        if statement == "}" {
            if !*has_address {
                return Err(syntax("lease without a fixed-address"));
            }
            if let Some((lease, _)) = current.take() {
                leases.push(lease);
            }
            continue;
        }

        let statement = match statement.strip_suffix(';') {
            Some(statement) => statement,
            None => return Err(syntax("missing `;`")),
        };
        let (keyword, rest) = split_word(statement);

        match keyword {
            "fixed-address" => {
                lease.address = rest.parse::<Ipv4Addr>().map_err(|_| syntax("invalid address"))?;
                *has_address = true;
            }
            "bootp" => lease.is_bootp = true,
            "medium" => lease.medium = Some(unquote(rest).ok_or_else(|| syntax("invalid string"))?),
            "server-name" => lease.server_name = unquote(rest).ok_or_else(|| syntax("invalid string"))?,
            "filename" => lease.boot_filename = unquote(rest).ok_or_else(|| syntax("invalid string"))?,
            "option" => {
                let (name, text) = split_word(rest);
                let (code, option) = parse_option(name, text).ok_or_else(|| syntax("invalid option"))?;
                lease.options.set(code, option);
            }
            "renew" => lease.renewal = parse_date(rest).ok_or_else(|| syntax("invalid date"))?,
            "rebind" => lease.rebind = parse_date(rest).ok_or_else(|| syntax("invalid date"))?,
            "expire" => lease.expiry = parse_date(rest).ok_or_else(|| syntax("invalid date"))?,
            _ => return Err(syntax("unknown statement")),
        }
    }

    if current.is_some() {
        return Err(Error::LeaseFileSyntax {
            line: text.lines().count(),
            reason: "unterminated lease".to_owned(),
        });
    }
    Ok(leases)
}

fn empty_lease() -> Lease {
    Lease {
        address: Ipv4Addr::UNSPECIFIED,
        server_name: String::new(),
        boot_filename: String::new(),
        options: Options::new(),
        expiry: Time::ZERO,
        renewal: Time::ZERO,
        rebind: Time::ZERO,
        is_bootp: false,
        is_static: false,
        medium: None,
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(index) => (&text[..index], text[index..].trim()),
        None => (text, ""),
    }
}

fn parse_option(name: &str, text: &str) -> Option<(u8, Vec<u8>)> {
    if let Ok(code) = name.parse::<u8>() {
        return value::from_hex(text).map(|option| (code, option));
    }
    let code = OptionTag::code(name)?;
    let option = if text.starts_with('"') {
        unquote(text)?.into_bytes()
    } else {
        value::parse(code, text)?
    };
    Some((code, option))
}

fn parse_date(text: &str) -> Option<Time> {
    if text == "never" {
        return Some(Time::ZERO);
    }
    let date = NaiveDateTime::parse_from_str(text, DATE_FORMAT).ok()?;
    let seconds = Utc.from_utc_datetime(&date).timestamp();
    if seconds < 0 {
        return None;
    }
    Some(Time::from_secs(seconds as u64))
}

fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut unquoted = String::with_capacity(inner.len());
    let mut characters = inner.chars();
    while let Some(character) = characters.next() {
        match character {
            '\\' => match characters.next()? {
                digit @ '0'..='3' => {
                    let mut code = digit.to_digit(8)?;
                    for _ in 0..2 {
                        code = code * 8 + characters.next()?.to_digit(8)?;
                    }
                    unquoted.push(char::from_u32(code)?);
                }
                escaped => unquoted.push(escaped),
            },
            '"' => return None,
            _ => unquoted.push(character),
        }
    }
    Some(unquoted)
}
