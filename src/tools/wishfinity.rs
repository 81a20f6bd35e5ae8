//! `get_wishfinity_save_link`: builds a Wishfinity +W deep link for a product URL

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rmcp::model::{CallToolResult, Content};
use schemars::JsonSchema;
use serde::Deserialize;
use url::Url;

use super::{ToolHandler, ToolInput};

pub const TOOL_NAME: &str = "get_wishfinity_save_link";

const ADD_ENDPOINT: &str = "https://wishfinity.com/add";
const SOURCE: &str = "chatgpt";

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, the set browsers leave
/// bare in `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveLinkInput {
    /// Absolute http(s) URL of the product page to save
    #[schemars(url)]
    pub url: String,
}

impl ToolInput for SaveLinkInput {
    fn validate(&self) -> Result<(), String> {
        let parsed = Url::parse(&self.url).map_err(|e| format!("Invalid url: {e}"))?;
        let scheme_ok = matches!(parsed.scheme(), "http" | "https")
            && (self.url.starts_with("http://") || self.url.starts_with("https://"));
        if !scheme_ok {
            return Err("URL must start with http:// or https://".to_string());
        }
        Ok(())
    }
}

/// Action URL the user opens to save `product_url` in Wishfinity
pub fn save_link(product_url: &str) -> String {
    format!(
        "{ADD_ENDPOINT}?url={}&source={SOURCE}",
        utf8_percent_encode(product_url, URI_COMPONENT)
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WishfinitySaveLink;

#[async_trait]
impl ToolHandler for WishfinitySaveLink {
    type Input = SaveLinkInput;

    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Generate a Wishfinity +W save link for a product URL. The user will click the link \
         to open Wishfinity in their browser, sign in if needed, and confirm the item is saved."
    }

    async fn call(&self, input: SaveLinkInput) -> anyhow::Result<CallToolResult> {
        let action_url = save_link(&input.url);
        let text = format!(
            "Save in Wishfinity: {action_url}\n\n\
             This opens in your browser. If you're not signed in, Wishfinity will prompt you \
             to sign in and then save the item."
        );
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn decoded_url_param(link: &str) -> String {
        let query = Url::parse(link).unwrap();
        let (_, value) = query
            .query_pairs()
            .find(|(k, _)| k == "url")
            .expect("url parameter");
        value.into_owned()
    }

    #[test]
    fn encodes_query_and_reserved_characters() {
        assert_eq!(
            save_link("https://example.com/item?a=1&b=2"),
            "https://wishfinity.com/add?url=https%3A%2F%2Fexample.com%2Fitem%3Fa%3D1%26b%3D2&source=chatgpt"
        );
    }

    #[test]
    fn leaves_uri_component_marks_bare() {
        assert_eq!(
            save_link("https://e.com/a(b)!*'"),
            "https://wishfinity.com/add?url=https%3A%2F%2Fe.com%2Fa(b)!*'&source=chatgpt"
        );
        assert_eq!(
            save_link("https://e.com/~x_y-z.html?q=a b+c"),
            "https://wishfinity.com/add?url=https%3A%2F%2Fe.com%2F~x_y-z.html%3Fq%3Da%20b%2Bc&source=chatgpt"
        );
    }

    #[test]
    fn schema_advertises_uri_format() {
        let schema = crate::tools::input_schema_for::<SaveLinkInput>();
        assert_eq!(schema["properties"]["url"]["format"], "uri");
        assert_eq!(schema["required"], json!(["url"]));
    }

    #[test]
    fn url_parameter_round_trips() {
        let urls = [
            "https://example.com/item?a=1&b=2",
            "http://shop.example.org/p/ünïcode?q=a b#frag",
            "https://example.com/path+with+plus?x=%20already%20encoded",
            "https://user:pw@example.com:8443/a;b,c/(d)*e!f~g'",
        ];
        for url in urls {
            let link = save_link(url);
            assert!(link.starts_with("https://wishfinity.com/add?url="));
            assert!(link.ends_with("&source=chatgpt"));
            assert_eq!(decoded_url_param(&link), url);
        }
    }

    #[test]
    fn accepts_http_and_https_only() {
        let ok = |url: &str| SaveLinkInput { url: url.to_string() }.validate();
        assert!(ok("https://example.com").is_ok());
        assert!(ok("http://example.com/x?y=z").is_ok());
        assert!(ok("ftp://example.com/file").is_err());
        assert!(ok("javascript:alert(1)").is_err());
        assert!(ok("example.com/item").is_err());
        assert!(ok("not a url").is_err());
        assert!(ok("").is_err());
    }

    #[tokio::test]
    async fn rejects_before_handler_runs() {
        let registry = ToolRegistry::with_defaults();
        for args in [json!({"url": "mailto:a@b.c"}), json!({"url": 42}), json!({})] {
            let err = registry.invoke(TOOL_NAME, args).await.unwrap_err();
            assert!(matches!(err, ProtocolError::InvalidParams(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn returns_text_block_with_action_url() {
        let result = WishfinitySaveLink
            .call(SaveLinkInput {
                url: "https://example.com/item?a=1&b=2".to_string(),
            })
            .await
            .unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        let text = value["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Save in Wishfinity: https://wishfinity.com/add?url=https%3A%2F%2Fexample.com"));
        assert!(text.contains("sign in"));
    }
}
