use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use log::trace;

use super::{LookupError, NameService};

const CYMRU_ZONE: &str = "asn.cymru.com";

/// Team Cymru IP-to-ASN mapping service, queried over DNS TXT records
pub struct CymruNameService {
    resolver: TokioAsyncResolver,
}

impl CymruNameService {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

impl Default for CymruNameService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameService for CymruNameService {
    async fn lookup(&self, asn: u32) -> Result<String, LookupError> {
        let query = format!("AS{}.{}.", asn, CYMRU_ZONE);
        trace!("Querying TXT {}", query);
        let response = self
            .resolver
            .txt_lookup(query)
            .await
            .map_err(|err| LookupError::Query {
                asn,
                reason: err.to_string(),
            })?;
        let record = response
            .iter()
            .map(|txt| txt.to_string())
            .next()
            .ok_or(LookupError::NotFound(asn))?;
        parse_txt(&record).ok_or(LookupError::NotFound(asn))
    }
}

/// Name from an "ASN | CC | Registry | Allocated | Name" record
pub fn parse_txt(record: &str) -> Option<String> {
    let name = record.rsplit('|').next()?.trim().trim_matches('"').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_txt() {
        assert_eq!(
            parse_txt("15169 | US | arin | 2000-03-30 | GOOGLE - Google LLC, US"),
            Some("GOOGLE - Google LLC, US".to_string())
        );
        assert_eq!(
            parse_txt("\"210083 | SE | ripencc | 2019-01-09 | PRIVEX, SE\""),
            Some("PRIVEX, SE".to_string())
        );
        assert_eq!(parse_txt("64500 | ZZ | | |  "), None);
        assert_eq!(parse_txt(""), None);
    }
}
