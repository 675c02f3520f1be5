//! Minimal parser for data source URIs
//!
//! Accepted shape: `scheme://path?key=value&key=value#fragment`. A query
//! written after the fragment (`mem://#64,64,64,32?sparsity=0.5`) is also
//! recognised.

use std::fmt;

use crate::core::error::Error;
use crate::core::types::Result;

/// Parsed data source URI
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceUri {
    pub scheme: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub fragment: String,
}

impl SourceUri {
    /// Parse a URI; fails with [`Error::InvalidSource`] when there is no scheme
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| Error::InvalidSource(format!("missing scheme in '{uri}'")))?;

        let scheme_ok = !scheme.is_empty()
            && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
        if !scheme_ok {
            return Err(Error::InvalidSource(format!("malformed scheme in '{uri}'")));
        }

        let (before_fragment, fragment) = match rest.split_once('#') {
            Some((head, fragment)) => (head, fragment),
            None => (rest, ""),
        };
        let (path, mut query) = match before_fragment.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (before_fragment, Vec::new()),
        };
        let fragment = match fragment.split_once('?') {
            Some((fragment, trailing)) => {
                query.extend(parse_query(trailing));
                fragment
            }
            None => fragment,
        };

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            path: path.to_string(),
            query,
            fragment: fragment.to_string(),
        })
    }

    /// Value of the first query entry named `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Comma separated fragment values, empty entries dropped
    pub fn fragment_values(&self) -> Vec<&str> {
        self.fragment
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)?;
        for (i, (k, v)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{k}={v}")?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let uri = SourceUri::parse("raw:///data/head.raw?endian=big#256,256,128,uint8").unwrap();
        assert_eq!(uri.scheme, "raw");
        assert_eq!(uri.path, "/data/head.raw");
        assert_eq!(uri.query_value("endian"), Some("big"));
        assert_eq!(uri.fragment_values(), vec!["256", "256", "128", "uint8"]);
    }

    #[test]
    fn test_query_after_fragment() {
        let uri = SourceUri::parse("mem://#64,64,64,16?sparsity=0.5&datatype=uint16").unwrap();
        assert_eq!(uri.scheme, "mem");
        assert_eq!(uri.fragment, "64,64,64,16");
        assert_eq!(uri.query_value("sparsity"), Some("0.5"));
        assert_eq!(uri.query_value("datatype"), Some("uint16"));
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(SourceUri::parse("no-scheme"), Err(Error::InvalidSource(_))));
        assert!(matches!(SourceUri::parse("://path"), Err(Error::InvalidSource(_))));
        assert!(matches!(SourceUri::parse("bad scheme://x"), Err(Error::InvalidSource(_))));
    }

    #[test]
    fn test_display() {
        let uri = SourceUri::parse("MEM://?sparsity=0.25#32,32,32,8").unwrap();
        assert_eq!(uri.to_string(), "mem://?sparsity=0.25#32,32,32,8");
    }
}
