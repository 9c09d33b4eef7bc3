//! Kerberos ticket containers handed over by the extraction engine.
//!
//! A [`KerberosTicket`] carries its already encoded kirbi (KRB-CRED) blob and
//! knows its own on-disk file name. A [`TicketCache`] is the per-source
//! collection of tickets in MIT ccache form; [`TicketCache::write_to`] emits
//! the version 4 encoding.
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::credential::hex_bytes;

const CCACHE_V4: u16 = 0x0504;
const KIRBI_LINE_WIDTH: usize = 100;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._@\-]").expect("static regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketType {
    Tgt,
    #[default]
    Tgs,
    Client,
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketType::Tgt => "TGT",
            TicketType::Tgs => "TGS",
            TicketType::Client => "CLIENT",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KerberosTicket {
    #[serde(default)]
    pub ticket_type: TicketType,
    #[serde(default)]
    pub service_name: Vec<String>,
    #[serde(default)]
    pub service_realm: String,
    #[serde(default)]
    pub client_name: Vec<String>,
    #[serde(default)]
    pub client_realm: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub renew_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub key_type: i32,
    #[serde(default, with = "hex_bytes")]
    pub key: Vec<u8>,
    #[serde(default, with = "hex_bytes")]
    pub kirbi: Vec<u8>,
}

impl KerberosTicket {
    /// `<TYPE>_<client>@<realm>_<service>@<realm>_<digest>.kirbi`, where the
    /// digest is the first four bytes of SHA-256 over the kirbi blob.
    pub fn file_name(&self) -> String {
        let digest = Sha256::digest(&self.kirbi);
        let stem = format!(
            "{}_{}@{}_{}@{}_{}",
            self.ticket_type,
            self.client_name.join("/"),
            self.client_realm,
            self.service_name.join("/"),
            self.service_realm,
            hex::encode(&digest[..4]),
        );
        format!("{}.kirbi", UNSAFE_FILENAME_CHARS.replace_all(&stem, "_"))
    }

    /// Write the kirbi blob into `dir` under [`Self::file_name`].
    pub fn to_kirbi(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(self.file_name());
        fs::write(&path, &self.kirbi)?;
        Ok(path)
    }
}

fn fmt_time(t: &Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_default()
}

impl fmt::Display for KerberosTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t\t== Ticket ({}) ==", self.ticket_type)?;
        writeln!(f, "\t\t\tServiceName  : {}", self.service_name.join("/"))?;
        writeln!(f, "\t\t\tServiceRealm : {}", self.service_realm)?;
        writeln!(f, "\t\t\tClientName   : {}", self.client_name.join("/"))?;
        writeln!(f, "\t\t\tClientRealm  : {}", self.client_realm)?;
        writeln!(f, "\t\t\tStartTime    : {}", fmt_time(&self.start_time))?;
        writeln!(f, "\t\t\tEndTime      : {}", fmt_time(&self.end_time))?;
        writeln!(f, "\t\t\tRenewUntil   : {}", fmt_time(&self.renew_until))?;
        writeln!(f, "\t\t\tFlags        : {:#010x}", self.flags)?;
        writeln!(f, "\t\t\tKeytype      : {}", self.key_type)?;
        writeln!(f, "\t\t\tKey          : {}", BASE64.encode(&self.key))?;
        writeln!(f, "\t\t\tEncodedKirbi :")?;
        let encoded = BASE64.encode(&self.kirbi);
        // base64 output is ASCII, so byte chunks are valid str slices
        for chunk in encoded.as_bytes().chunks(KIRBI_LINE_WIDTH) {
            writeln!(f, "\t\t\t\t{}", String::from_utf8_lossy(chunk))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(default)]
    pub name_type: u32,
    #[serde(default)]
    pub realm: String,
    #[serde(default)]
    pub components: Vec<String>,
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.components.join("/"), self.realm)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyblock {
    #[serde(default)]
    pub keytype: u16,
    #[serde(default, with = "hex_bytes")]
    pub keyvalue: Vec<u8>,
}

/// One ccache entry. Times are seconds since the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
    pub client: Principal,
    pub server: Principal,
    #[serde(default)]
    pub key: Keyblock,
    #[serde(default)]
    pub auth_time: u32,
    #[serde(default)]
    pub start_time: u32,
    #[serde(default)]
    pub end_time: u32,
    #[serde(default)]
    pub renew_till: u32,
    #[serde(default)]
    pub is_skey: u8,
    #[serde(default)]
    pub ticket_flags: u32,
    #[serde(default, with = "hex_bytes")]
    pub ticket: Vec<u8>,
    #[serde(default, with = "hex_bytes")]
    pub second_ticket: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCache {
    #[serde(default)]
    pub primary_principal: Option<Principal>,
    #[serde(default)]
    pub credentials: Vec<CachedCredential>,
}

impl TicketCache {
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Encode as an MIT ccache (v4, no header tags). Without an explicit
    /// primary principal the first credential's client is used.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(CCACHE_V4)?;
        w.write_u16::<BigEndian>(0)?;
        let fallback = Principal::default();
        let primary = self
            .primary_principal
            .as_ref()
            .or_else(|| self.credentials.first().map(|c| &c.client))
            .unwrap_or(&fallback);
        write_principal(w, primary)?;
        for cred in &self.credentials {
            write_credential(w, cred)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write the encoded cache to a new file at `path`. Fails with
    /// `AlreadyExists` instead of replacing an existing file.
    pub fn to_file(&self, path: &Path) -> io::Result<()> {
        let f = OpenOptions::new().write(true).create_new(true).open(path)?;
        let mut w = BufWriter::new(f);
        self.write_to(&mut w)?;
        w.flush()
    }
}

fn write_principal<W: Write>(w: &mut W, p: &Principal) -> io::Result<()> {
    w.write_u32::<BigEndian>(p.name_type)?;
    w.write_u32::<BigEndian>(p.components.len() as u32)?;
    write_counted(w, p.realm.as_bytes())?;
    for c in &p.components {
        write_counted(w, c.as_bytes())?;
    }
    Ok(())
}

fn write_credential<W: Write>(w: &mut W, c: &CachedCredential) -> io::Result<()> {
    write_principal(w, &c.client)?;
    write_principal(w, &c.server)?;
    w.write_u16::<BigEndian>(c.key.keytype)?;
    write_counted(w, &c.key.keyvalue)?;
    w.write_u32::<BigEndian>(c.auth_time)?;
    w.write_u32::<BigEndian>(c.start_time)?;
    w.write_u32::<BigEndian>(c.end_time)?;
    w.write_u32::<BigEndian>(c.renew_till)?;
    w.write_u8(c.is_skey)?;
    w.write_u32::<BigEndian>(c.ticket_flags)?;
    // no addresses, no authdata
    w.write_u32::<BigEndian>(0)?;
    w.write_u32::<BigEndian>(0)?;
    write_counted(w, &c.ticket)?;
    write_counted(w, &c.second_ticket)
}

fn write_counted<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    w.write_u32::<BigEndian>(data.len() as u32)?;
    w.write_all(data)
}
