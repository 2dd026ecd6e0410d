//! Normalization of file URIs handed to the dataset factory.
//!
//! | input scheme | normalized |
//! |---|---|
//! | `s3`, `s3a` | `s3://authority/path?query#fragment` |
//! | `hdfs` | scheme-specific part unchanged |
//! | `file` | scheme-specific part prefixed with `//` |
//!
//! Everything else is rejected.

use std::fmt;
use std::path::PathBuf;

use dsbridge_result::{Error, Result};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriScheme {
    S3,
    Hdfs,
    File,
}

impl UriScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UriScheme::S3 => "s3",
            UriScheme::Hdfs => "hdfs",
            UriScheme::File => "file",
        }
    }
}

impl fmt::Display for UriScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URI in the `(scheme, scheme-specific part)` form readers accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUri {
    scheme: UriScheme,
    scheme_specific_part: String,
    fragment: Option<String>,
}

fn split_fragment(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('#') {
        Some((ssp, fragment)) => (ssp, Some(fragment)),
        None => (rest, None),
    }
}

impl NormalizedUri {
    /// Parse and normalize an encoded URI string.
    pub fn parse(encoded: &str) -> Result<Self> {
        let (scheme, rest) = encoded.split_once(':').ok_or_else(|| {
            Error::InvalidArgumentError(format!("URI \"{encoded}\" has no scheme"))
        })?;

        let normalized = match scheme.to_ascii_lowercase().as_str() {
            "s3" | "s3a" => Self::parse_s3(encoded)?,
            "hdfs" => {
                let (ssp, fragment) = split_fragment(rest);
                Self {
                    scheme: UriScheme::Hdfs,
                    scheme_specific_part: ssp.to_string(),
                    fragment: fragment.map(str::to_string),
                }
            }
            "file" => {
                let (ssp, fragment) = split_fragment(rest);
                Self {
                    scheme: UriScheme::File,
                    scheme_specific_part: format!("//{ssp}"),
                    fragment: fragment.map(str::to_string),
                }
            }
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "unsupported URI scheme \"{other}\" in \"{encoded}\""
                )));
            }
        };

        debug!(input = encoded, normalized = %normalized, "rewrote URI");
        Ok(normalized)
    }

    fn parse_s3(encoded: &str) -> Result<Self> {
        let mut url = Url::parse(encoded).map_err(|err| {
            Error::InvalidArgumentError(format!("invalid URI \"{encoded}\": {err}"))
        })?;
        url.set_scheme("s3").map_err(|_| {
            Error::InvalidArgumentError(format!("cannot rewrite \"{encoded}\" to the s3 scheme"))
        })?;
        let fragment = url.fragment().map(str::to_string);
        url.set_fragment(None);
        let scheme_specific_part = url
            .as_str()
            .strip_prefix("s3:")
            .unwrap_or(url.as_str())
            .to_string();
        Ok(Self {
            scheme: UriScheme::S3,
            scheme_specific_part,
            fragment,
        })
    }

    pub fn scheme(&self) -> UriScheme {
        self.scheme
    }

    /// Everything between the scheme separator and the fragment.
    pub fn scheme_specific_part(&self) -> &str {
        &self.scheme_specific_part
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Local path for a `file` URI, percent-decoded.
    pub fn to_file_path(&self) -> Result<PathBuf> {
        if self.scheme != UriScheme::File {
            return Err(Error::InvalidArgumentError(format!(
                "\"{self}\" is not a local file URI; only file URIs can be read"
            )));
        }
        let path = self.scheme_specific_part.trim_start_matches('/');
        let url = Url::parse(&format!("file:///{path}")).map_err(|err| {
            Error::InvalidArgumentError(format!("invalid file URI \"{self}\": {err}"))
        })?;
        url.to_file_path()
            .map_err(|_| Error::InvalidArgumentError(format!("\"{self}\" has no local path")))
    }
}

impl fmt::Display for NormalizedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.scheme_specific_part)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Normalize `encoded` and render it back to a string.
pub fn rewrite_uri(encoded: &str) -> Result<String> {
    NormalizedUri::parse(encoded).map(|uri| uri.to_string())
}
