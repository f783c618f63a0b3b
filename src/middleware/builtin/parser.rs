//! Body parser middleware
//!
//! Each parser only acts on its own media type (compared case-insensitively)
//! and passes every other request
//! straight through. A body that cannot be read or decoded ends the chain with
//! `400 Bad Request` and the reason recorded in `req.error`.

use crate::error::{Error, Result};
use crate::http::{parse_pairs, BodyData, Request, Response};
use crate::middleware::{Handler, Next};
use async_trait::async_trait;
use hyper::StatusCode;
use percent_encoding::percent_decode;

pub const JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Decodes `application/json` bodies into [`BodyData::Json`]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

/// Decodes `application/x-www-form-urlencoded` bodies into [`BodyData::Form`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlencodedParser;

async fn decode_json(req: &mut Request) -> Result<BodyData> {
    let body = req.body().await?;
    serde_json::from_slice(&body)
        .map(BodyData::Json)
        .map_err(|e| Error::parse(e.to_string()))
}

async fn decode_form(req: &mut Request) -> Result<BodyData> {
    let body = req.body().await?;
    validate_form(&body)?;
    Ok(BodyData::Form(parse_pairs(&body)))
}

/// Reject malformed escapes and names or values that are not UTF-8
///
/// `parse_pairs` decodes lossily, so a bad body would otherwise parse.
fn validate_form(body: &[u8]) -> Result<()> {
    for component in body.split(|b| *b == b'&' || *b == b'=') {
        let mut rest = component;
        while let Some(at) = rest.iter().position(|b| *b == b'%') {
            let escape = rest.get(at + 1..at + 3).unwrap_or_default();
            if escape.len() != 2 || !escape.iter().all(u8::is_ascii_hexdigit) {
                return Err(Error::parse("Malformed percent-escape in form body"));
            }
            rest = &rest[at + 3..];
        }

        percent_decode(component)
            .decode_utf8()
            .map_err(|e| Error::parse(format!("Form body is not valid UTF-8: {}", e)))?;
    }
    Ok(())
}

fn is_media_type(req: &Request, expected: &str) -> bool {
    req.content_type()
        .map_or(false, |media| media.eq_ignore_ascii_case(expected))
}

fn reject(req: &mut Request, res: &mut Response, error: Error) {
    log::warn!("Rejecting {} {} body: {}", req.method, req.path(), error);
    res.set_status(StatusCode::BAD_REQUEST);
    req.error = Some(error.to_string());
}

#[async_trait]
impl Handler for JsonParser {
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        if is_media_type(req, JSON) {
            match decode_json(req).await {
                Ok(data) => req.data = Some(data),
                Err(e) => {
                    reject(req, res, e);
                    return Ok(());
                }
            }
        }
        next.run(req, res).await
    }

    fn name(&self) -> &'static str {
        "json_parser"
    }
}

#[async_trait]
impl Handler for UrlencodedParser {
    async fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        if is_media_type(req, FORM_URLENCODED) {
            match decode_form(req).await {
                Ok(data) => req.data = Some(data),
                Err(e) => {
                    reject(req, res, e);
                    return Ok(());
                }
            }
        }
        next.run(req, res).await
    }

    fn name(&self) -> &'static str {
        "urlencoded_parser"
    }
}
