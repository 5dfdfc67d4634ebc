//! Anonymous client for S3-compatible HTTP endpoints.
//!
//! Listing uses `ListObjectsV2` with path-style addressing
//! (`{endpoint}/{bucket}?list-type=2&prefix=...`) and follows continuation
//! tokens. Objects are streamed to disk with a plain `GET`. Requests are not
//! signed, so only public buckets or presigning proxies work.

use std::path::Path;
use std::time::Duration;

use url::Url;

use super::ObjectStore;
use crate::error::DalError;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub struct HttpObjectStore {
    endpoint: Url,
    agent: ureq::Agent,
}

impl HttpObjectStore {
    /// Create a client for `endpoint`, e.g. `https://s3.amazonaws.com`.
    pub fn new(endpoint: &str) -> Result<Self, DalError> {
        let endpoint = Url::parse(endpoint).map_err(|source| DalError::Configuration {
            field: "endpoint",
            value: endpoint.to_string(),
            message: source.to_string(),
        })?;

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build();
        let agent: ureq::Agent = config.into();

        Ok(Self { endpoint, agent })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn bucket_url(&self, bucket: &str) -> Result<Url, String> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| format!("endpoint {} cannot be a base URL", self.endpoint))?
            .pop_if_empty()
            .push(bucket);
        Ok(url)
    }

    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, String> {
        let mut url = self.bucket_url(bucket)?;
        url.path_segments_mut()
            .map_err(|()| format!("endpoint {} cannot be a base URL", self.endpoint))?
            .extend(key.split('/'));
        Ok(url)
    }

    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, String> {
        let mut url = self.bucket_url(bucket)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("list-type", "2");
            query.append_pair("prefix", prefix);
            if let Some(token) = continuation {
                query.append_pair("continuation-token", token);
            }
        }

        let mut response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|source| source.to_string())?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|source| source.to_string())?;
        parse_list_page(&body)
    }
}

impl ObjectStore for HttpObjectStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, DalError> {
        let to_error = |message: String| DalError::Transfer {
            bucket: bucket.to_string(),
            key: prefix.to_string(),
            message,
        };

        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .list_page(bucket, prefix, continuation.as_deref())
                .map_err(to_error)?;
            keys.extend(page.keys);
            match page.next {
                Some(token) if page.truncated => continuation = Some(token),
                _ => break,
            }
        }
        Ok(keys)
    }

    fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, DalError> {
        let to_error = |message: String| DalError::Transfer {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let url = self.object_url(bucket, key).map_err(to_error)?;
        let mut response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|source| to_error(source.to_string()))?;

        let mut file = std::fs::File::create(dest)?;
        let mut reader = response.body_mut().as_reader();
        let bytes = std::io::copy(&mut reader, &mut file)
            .map_err(|source| to_error(source.to_string()))?;
        file.sync_all()?;
        Ok(bytes)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ListPage {
    keys: Vec<String>,
    truncated: bool,
    next: Option<String>,
}

fn parse_list_page(body: &str) -> Result<ListPage, String> {
    let doc = roxmltree::Document::parse(body).map_err(|source| source.to_string())?;
    let root = doc.root_element();
    if root.tag_name().name() == "Error" {
        let message = child_text(root, "Message")
            .or_else(|| child_text(root, "Code"))
            .unwrap_or("unknown error");
        return Err(message.to_string());
    }

    let keys = root
        .children()
        .filter(|node| node.tag_name().name() == "Contents")
        .filter_map(|node| child_text(node, "Key"))
        .map(str::to_string)
        .collect();

    Ok(ListPage {
        keys,
        truncated: child_text(root, "IsTruncated") == Some("true"),
        next: child_text(root, "NextContinuationToken").map(str::to_string),
    })
}

/// Fuzz-only entrypoint for `ListObjectsV2` response parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_list_page(body: &str) -> Result<usize, String> {
    parse_list_page(body).map(|page| page.keys.len())
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.tag_name().name() == name)
        .and_then(|child| child.text())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>ml-data</Name>
  <Prefix>criteo/</Prefix>
  <KeyCount>2</KeyCount>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>abc==</NextContinuationToken>
  <Contents><Key>criteo/day_0.csv</Key><Size>10</Size></Contents>
  <Contents><Key>criteo/day_1.csv</Key><Size>12</Size></Contents>
</ListBucketResult>"#;

    #[test]
    fn parses_keys_and_continuation() {
        let page = parse_list_page(PAGE).unwrap();
        assert_eq!(page.keys, vec!["criteo/day_0.csv", "criteo/day_1.csv"]);
        assert!(page.truncated);
        assert_eq!(page.next.as_deref(), Some("abc=="));
    }

    #[test]
    fn final_page_is_not_truncated() {
        let body = "<ListBucketResult><IsTruncated>false</IsTruncated>\
                    <Contents><Key>a</Key></Contents></ListBucketResult>";
        let page = parse_list_page(body).unwrap();
        assert_eq!(page.keys, vec!["a"]);
        assert!(!page.truncated);
        assert_eq!(page.next, None);
    }

    #[test]
    fn error_document_becomes_message() {
        let body = "<Error><Code>NoSuchBucket</Code>\
                    <Message>The specified bucket does not exist</Message></Error>";
        assert_eq!(
            parse_list_page(body).unwrap_err(),
            "The specified bucket does not exist"
        );
    }

    #[test]
    fn object_urls_are_path_style() {
        let store = HttpObjectStore::new("https://s3.example.com/").unwrap();
        assert_eq!(
            store.object_url("ml-data", "criteo/day 0.csv").unwrap().as_str(),
            "https://s3.example.com/ml-data/criteo/day%200.csv"
        );
    }

    #[test]
    fn invalid_endpoint_is_a_configuration_error() {
        assert!(matches!(
            HttpObjectStore::new("not a url"),
            Err(DalError::Configuration { field: "endpoint", .. })
        ));
    }
}
