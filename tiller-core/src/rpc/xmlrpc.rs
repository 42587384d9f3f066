//! XML-RPC wire codec and HTTP transport
//!
//! rTorrent's control surface is plain XML-RPC over HTTP (usually behind
//! a web server fronting the SCGI socket). The documents involved are
//! small and rigidly shaped, so the codec is hand-assembled strings on
//! the way out and a recursive-descent reader on the way back.

use std::fmt::Write as _;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDateTime;
use url::Url;

use crate::config::NetworkConfig;

use super::transport::Transport;
use super::value::Value;
use super::RpcError;

/// Serializes one `<methodCall>` document.
///
/// # Errors
///
/// - `RpcError::UnexpectedValue` - If a parameter cannot be represented on the wire
pub fn encode_request(method: &str, params: &[Value]) -> Result<String, RpcError> {
    let mut out = String::with_capacity(128);
    out.push_str("<?xml version=\"1.0\"?>");
    out.push_str("<methodCall><methodName>");
    escape_into(method, &mut out);
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out)?;
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    Ok(out)
}

fn encode_value(value: &Value, out: &mut String) -> Result<(), RpcError> {
    out.push_str("<value>");
    match value {
        // i8 is the 64-bit extension rTorrent uses for sizes and rates.
        Value::Int(v) => {
            let _ = write!(out, "<i8>{v}</i8>");
        }
        Value::Bool(v) => {
            let _ = write!(out, "<boolean>{}</boolean>", i32::from(*v));
        }
        // NaN/infinity have no <double> representation and would produce
        // a document the daemon rejects.
        Value::Double(v) => {
            if !v.is_finite() {
                return Err(RpcError::UnexpectedValue {
                    message: format!("cannot encode non-finite double {v}"),
                });
            }
            let _ = write!(out, "<double>{v}</double>");
        }
        Value::String(v) => {
            out.push_str("<string>");
            escape_into(v, out);
            out.push_str("</string>");
        }
        Value::Bytes(v) => {
            let _ = write!(out, "<base64>{}</base64>", BASE64.encode(v));
        }
        Value::DateTime(v) => {
            let _ = write!(out, "<dateTime.iso8601>{}</dateTime.iso8601>", v.format("%Y%m%dT%H:%M:%S"));
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out)?;
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                escape_into(name, out);
                out.push_str("</name>");
                encode_value(member, out)?;
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
    Ok(())
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

/// Parses one `<methodResponse>` document into its result value.
///
/// # Errors
///
/// - `RpcError::Protocol` - If the document is structurally invalid
/// - `RpcError::ServerFault` - If the daemon answered with a `<fault>`
pub fn parse_response(document: &str) -> Result<Value, RpcError> {
    let mut reader = Reader::new(document);
    reader.skip_declaration();
    reader.expect("<methodResponse>")?;

    if reader.eat("<fault>") {
        let fault = reader.parse_value()?;
        reader.expect("</fault>")?;
        reader.expect("</methodResponse>")?;
        return Err(fault_to_error(&fault));
    }

    reader.expect("<params>")?;
    reader.expect("<param>")?;
    let value = reader.parse_value()?;
    reader.expect("</param>")?;
    reader.expect("</params>")?;
    reader.expect("</methodResponse>")?;
    Ok(value)
}

fn fault_to_error(fault: &Value) -> RpcError {
    let members = match fault.as_struct() {
        Some(members) => members,
        None => {
            return RpcError::Protocol {
                message: "fault payload is not a struct".to_string(),
            };
        }
    };

    RpcError::ServerFault {
        code: members.get("faultCode").and_then(Value::as_i64).unwrap_or(-1),
        message: members
            .get("faultString")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown daemon fault")
            .to_string(),
    }
}

/// Minimal forward-only reader over an XML-RPC response document.
struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn skip_declaration(&mut self) {
        self.skip_whitespace();
        if self.rest().starts_with("<?")
            && let Some(end) = self.rest().find("?>")
        {
            self.pos += end + 2;
        }
    }

    /// Consumes `literal` (after whitespace) if present.
    fn eat(&mut self, literal: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, literal: &str) -> Result<(), RpcError> {
        if self.eat(literal) {
            Ok(())
        } else {
            Err(RpcError::Protocol {
                message: format!(
                    "expected {literal} at byte {} of XML-RPC response",
                    self.pos
                ),
            })
        }
    }

    /// Returns the raw text up to `close` and consumes through it.
    fn text_until(&mut self, close: &str) -> Result<&'a str, RpcError> {
        match self.rest().find(close) {
            Some(offset) => {
                let text = &self.rest()[..offset];
                self.pos += offset + close.len();
                Ok(text)
            }
            None => Err(RpcError::Protocol {
                message: format!("unterminated element, missing {close}"),
            }),
        }
    }

    fn parse_value(&mut self) -> Result<Value, RpcError> {
        if self.eat("<value/>") {
            return Ok(Value::String(String::new()));
        }
        self.expect("<value>")?;

        let value = if self.eat("<i8>") {
            self.parse_int("</i8>")?
        } else if self.eat("<i4>") {
            self.parse_int("</i4>")?
        } else if self.eat("<int>") {
            self.parse_int("</int>")?
        } else if self.eat("<boolean>") {
            let text = self.text_until("</boolean>")?.trim();
            match text {
                "1" => Value::Bool(true),
                "0" => Value::Bool(false),
                other => {
                    return Err(RpcError::Protocol {
                        message: format!("invalid boolean payload: {other:?}"),
                    });
                }
            }
        } else if self.eat("<double>") {
            let text = self.text_until("</double>")?.trim();
            Value::Double(text.parse().map_err(|_| RpcError::Protocol {
                message: format!("invalid double payload: {text:?}"),
            })?)
        } else if self.eat("<string/>") {
            Value::String(String::new())
        } else if self.eat("<string>") {
            Value::String(unescape(self.text_until("</string>")?)?)
        } else if self.eat("<base64/>") {
            Value::Bytes(Vec::new())
        } else if self.eat("<base64>") {
            let text: String = self
                .text_until("</base64>")?
                .chars()
                .filter(|ch| !ch.is_whitespace())
                .collect();
            Value::Bytes(BASE64.decode(text.as_bytes()).map_err(|error| {
                RpcError::Protocol {
                    message: format!("invalid base64 payload: {error}"),
                }
            })?)
        } else if self.eat("<dateTime.iso8601>") {
            let text = self.text_until("</dateTime.iso8601>")?.trim();
            let parsed = NaiveDateTime::parse_from_str(text, "%Y%m%dT%H:%M:%S").map_err(|_| {
                RpcError::Protocol {
                    message: format!("invalid dateTime payload: {text:?}"),
                }
            })?;
            Value::DateTime(parsed.and_utc())
        } else if self.eat("<array>") {
            self.expect("<data>")?;
            let mut items = Vec::new();
            loop {
                self.skip_whitespace();
                if !self.rest().starts_with("<value") {
                    break;
                }
                items.push(self.parse_value()?);
            }
            self.expect("</data>")?;
            self.expect("</array>")?;
            Value::Array(items)
        } else if self.eat("<struct>") {
            let mut members = std::collections::BTreeMap::new();
            while self.eat("<member>") {
                self.expect("<name>")?;
                let name = unescape(self.text_until("</name>")?)?;
                let member = self.parse_value()?;
                self.expect("</member>")?;
                members.insert(name, member);
            }
            self.expect("</struct>")?;
            Value::Struct(members)
        } else {
            // Untyped content defaults to string per the XML-RPC spec;
            // this branch consumes the closing tag itself.
            return Ok(Value::String(unescape(self.text_until("</value>")?)?));
        };

        self.expect("</value>")?;
        Ok(value)
    }

    fn parse_int(&mut self, close: &str) -> Result<Value, RpcError> {
        let text = self.text_until(close)?.trim();
        text.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| RpcError::Protocol {
                message: format!("invalid integer payload: {text:?}"),
            })
    }
}

fn unescape(text: &str) -> Result<String, RpcError> {
    if !text.contains('&') {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let end = rest.find(';').ok_or_else(|| RpcError::Protocol {
            message: "unterminated entity in XML-RPC text".to_string(),
        })?;
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse))
                    .transpose()
                    .ok()
                    .flatten();
                match code.and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        return Err(RpcError::Protocol {
                            message: format!("unknown entity &{entity};"),
                        });
                    }
                }
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// XML-RPC over HTTP POST, the standard way of reaching rTorrent's
/// control socket through a fronting web server.
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with timeout and user agent from `config`.
    pub fn new(endpoint: Url, config: &NetworkConfig) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::builder()
                .timeout(config.rpc_timeout)
                .user_agent(config.user_agent)
                .build()
                .expect("HTTP client creation should not fail"),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let body = encode_request(method, params)?;
        tracing::debug!(endpoint = %self.endpoint, method, "sending XML-RPC request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "text/xml")
            .body(body)
            .send()
            .await
            .inspect_err(|error| {
                tracing::warn!(endpoint = %self.endpoint, %error, "XML-RPC request failed");
            })?
            .error_for_status()?;

        let text = response.text().await?;
        parse_response(&text)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
