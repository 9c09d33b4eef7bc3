//! Credential model: one closed enum over the package kinds the extraction
//! engine recovers, tagged by `credtype` on the wire.
//!
//! Byte buffers (password hashes) are carried as raw bytes and serialized as
//! lowercase hex. DPAPI and CloudAP key material arrives from the engine
//! already hex-encoded and is kept verbatim.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kerberos::KerberosTicket;

/// Serde adapter: `Vec<u8>` as a hex string.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsvCredential {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub domainname: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, with = "hex_bytes")]
    pub lm_hash: Vec<u8>,
    #[serde(default, with = "hex_bytes")]
    pub nt_hash: Vec<u8>,
    #[serde(default, with = "hex_bytes")]
    pub sha_hash: Vec<u8>,
    #[serde(default, with = "hex_bytes")]
    pub dpapi: Vec<u8>,
}

/// Shape shared by the packages that only yield a username/domain/password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCredential {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub domainname: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KerberosCredential {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub domainname: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tickets: Vec<KerberosTicket>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpapiCredential {
    #[serde(default)]
    pub luid: u64,
    #[serde(default)]
    pub key_guid: String,
    #[serde(default)]
    pub masterkey: String,
    #[serde(default)]
    pub sha1_masterkey: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudApCredential {
    #[serde(default)]
    pub luid: u64,
    #[serde(default)]
    pub key_guid: String,
    #[serde(default)]
    pub masterkey: String,
    #[serde(default)]
    pub dpapi_key_sha1: String,
    #[serde(default, rename = "PRT")]
    pub prt: Option<String>,
}

/// A recovered credential. The `credtype` tag always matches the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "credtype", rename_all = "lowercase")]
pub enum Credential {
    Msv(MsvCredential),
    Wdigest(PasswordCredential),
    Tspkg(PasswordCredential),
    Ssp(PasswordCredential),
    Livessp(PasswordCredential),
    Dpapi(DpapiCredential),
    Cloudap(CloudApCredential),
    Kerberos(KerberosCredential),
}

impl Credential {
    pub fn cred_type(&self) -> &'static str {
        match self {
            Credential::Msv(_) => "msv",
            Credential::Wdigest(_) => "wdigest",
            Credential::Tspkg(_) => "tspkg",
            Credential::Ssp(_) => "ssp",
            Credential::Livessp(_) => "livessp",
            Credential::Dpapi(_) => "dpapi",
            Credential::Cloudap(_) => "cloudap",
            Credential::Kerberos(_) => "kerberos",
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Credential::Msv(c) => &c.username,
            Credential::Wdigest(c)
            | Credential::Tspkg(c)
            | Credential::Ssp(c)
            | Credential::Livessp(c) => &c.username,
            Credential::Kerberos(c) => &c.username,
            Credential::Dpapi(_) | Credential::Cloudap(_) => "",
        }
    }

    pub fn domainname(&self) -> &str {
        match self {
            Credential::Msv(c) => &c.domainname,
            Credential::Wdigest(c)
            | Credential::Tspkg(c)
            | Credential::Ssp(c)
            | Credential::Livessp(c) => &c.domainname,
            Credential::Kerberos(c) => &c.domainname,
            Credential::Dpapi(_) | Credential::Cloudap(_) => "",
        }
    }

    /// Cleartext password, for the kinds that can carry one.
    pub fn password(&self) -> Option<&str> {
        match self {
            Credential::Wdigest(c)
            | Credential::Tspkg(c)
            | Credential::Ssp(c)
            | Credential::Livessp(c) => c.password.as_deref(),
            Credential::Msv(c) => c.password.as_deref(),
            Credential::Kerberos(c) => c.password.as_deref(),
            Credential::Dpapi(_) | Credential::Cloudap(_) => None,
        }
    }

    /// Tickets held by a kerberos credential; empty for every other kind.
    pub fn tickets(&self) -> &[KerberosTicket] {
        match self {
            Credential::Kerberos(c) => &c.tickets,
            _ => &[],
        }
    }
}

fn write_password_block(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    c: &PasswordCredential,
) -> fmt::Result {
    writeln!(f, "\t== {} ==", title)?;
    writeln!(f, "\t\tusername {}", c.username)?;
    writeln!(f, "\t\tdomainname {}", c.domainname)?;
    writeln!(f, "\t\tpassword {}", c.password.as_deref().unwrap_or(""))
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Msv(c) => {
                writeln!(f, "\t== MSV ==")?;
                writeln!(f, "\t\tUsername: {}", c.username)?;
                writeln!(f, "\t\tDomain: {}", c.domainname)?;
                if let Some(pw) = &c.password {
                    writeln!(f, "\t\tPassword: {}", pw)?;
                }
                if !c.lm_hash.is_empty() {
                    writeln!(f, "\t\tLM: {}", hex::encode(&c.lm_hash))?;
                }
                writeln!(f, "\t\tNT: {}", hex::encode(&c.nt_hash))?;
                writeln!(f, "\t\tSHA1: {}", hex::encode(&c.sha_hash))?;
                writeln!(f, "\t\tDPAPI: {}", hex::encode(&c.dpapi))
            }
            Credential::Wdigest(c) => write_password_block(f, "WDIGEST", c),
            Credential::Tspkg(c) => write_password_block(f, "TSPKG", c),
            Credential::Ssp(c) => write_password_block(f, "SSP", c),
            Credential::Livessp(c) => write_password_block(f, "LiveSSP", c),
            Credential::Kerberos(c) => {
                writeln!(f, "\t== Kerberos ==")?;
                writeln!(f, "\t\tUsername: {}", c.username)?;
                writeln!(f, "\t\tDomain: {}", c.domainname)?;
                if let Some(pw) = &c.password {
                    writeln!(f, "\t\tPassword: {}", pw)?;
                }
                for t in &c.tickets {
                    write!(f, "{}", t)?;
                }
                Ok(())
            }
            Credential::Dpapi(c) => {
                writeln!(f, "\t== DPAPI [{:x}]==", c.luid)?;
                writeln!(f, "\t\tluid {}", c.luid)?;
                writeln!(f, "\t\tkey_guid {}", c.key_guid)?;
                writeln!(f, "\t\tmasterkey {}", c.masterkey)?;
                writeln!(f, "\t\tsha1_masterkey {}", c.sha1_masterkey)
            }
            Credential::Cloudap(c) => {
                writeln!(f, "\t== Cloudap [{:x}]==", c.luid)?;
                writeln!(f, "\t\tkey_guid {}", c.key_guid)?;
                writeln!(f, "\t\tdpapi_key {}", c.masterkey)?;
                writeln!(f, "\t\tdpapi_key_sha1 {}", c.dpapi_key_sha1)?;
                if let Some(prt) = &c.prt {
                    writeln!(f, "\t\tPRT {}", prt)?;
                }
                Ok(())
            }
        }
    }
}
