//! Command implementations. Items are printed to stdout as JSON; absence
//! and failures are reported through the exit status.

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use jskos_backend::{Backend, LookupRequest, RefreshEvent, Resolved};
use jskos_core::{compact_item, requested_format, Concept, Error, Format, Result};

pub const EXIT_OK: u8 = 0;
/// Item not found (the HTTP proxy answers 404). Absence is `Ok(None)`
/// throughout the backend, so this comes from printing an empty result.
pub const EXIT_NOT_FOUND: u8 = 4;
/// Upstream registry failure, or a first refresh that published nothing
/// (the HTTP proxy answers 5xx).
pub const EXIT_UPSTREAM: u8 = 5;
/// Bad request or configuration.
pub const EXIT_INVALID: u8 = 2;

/// Pick the output format. HTML views and RDF serializations are not
/// available here and are rejected like unknown formats.
pub fn output_format(format: Option<&str>, accept: Option<&str>) -> Result<Format> {
    let format = requested_format(format, accept)?;
    if format == Format::Html || format.needs_rdf() {
        return Err(Error::InvalidFormat(format.to_string()));
    }
    Ok(format)
}

/// Exit status for a failed command.
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<Error>() {
        Some(Error::Upstream(_)) | Some(Error::RefreshFailed(_)) => EXIT_UPSTREAM,
        Some(Error::InvalidFormat(_)) | Some(Error::InvalidInput(_)) | Some(Error::Config(_)) => {
            EXIT_INVALID
        }
        _ => 1,
    }
}

/// JSON document for a lookup result, or `None` if nothing was found.
pub fn render(
    backend: &Backend,
    resolved: Option<&Resolved>,
    format: Format,
) -> Result<Option<Value>> {
    let Some(resolved) = resolved else {
        return Ok(None);
    };
    let mut item = resolved.to_json()?;
    if format == Format::Debug {
        let config = backend.config();
        return Ok(Some(json!({
            "namespace": config.namespace,
            "listing": config.listing,
            "backends": config.backends,
            "format": format.as_str(),
            "item": item,
        })));
    }
    compact_item(&mut item);
    Ok(Some(item))
}

fn emit(document: Option<Value>, what: &str) -> anyhow::Result<u8> {
    match document {
        Some(document) => {
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(EXIT_OK)
        }
        None => {
            eprintln!("Not found: {}", what);
            Ok(EXIT_NOT_FOUND)
        }
    }
}

fn emit_list(concepts: Vec<Concept>) -> anyhow::Result<u8> {
    let mut document = serde_json::to_value(concepts)?;
    compact_item(&mut document);
    emit(Some(document), "")
}

pub async fn lookup(
    backend: &Backend,
    request: &LookupRequest,
    format: Format,
) -> anyhow::Result<u8> {
    let span = info_span!("lookup", request_id = %Uuid::now_v7(), format = %format);
    async {
        info!(?request, "get");
        let resolved = backend.resolve(request).await?;
        let document = render(backend, resolved.as_ref(), format)?;
        info!(found = document.is_some(), "{}", if document.is_some() { "got" } else { "missing" });
        emit(document, &describe(request))
    }
    .instrument(span)
    .await
}

fn describe(request: &LookupRequest) -> String {
    if let Some(uri) = &request.uri {
        return uri.clone();
    }
    [request.scheme_segment.as_deref(), request.concept_segment.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("/")
}

pub async fn schemes(backend: &Backend) -> anyhow::Result<u8> {
    let snapshot = backend.get_schemes().await?;
    let mut document = serde_json::to_value(snapshot.as_ref())?;
    compact_item(&mut document);
    emit(Some(document), "schemes")
}

pub async fn scheme(backend: &Backend, uri: &str) -> anyhow::Result<u8> {
    let document = render(
        backend,
        backend.get_scheme(uri).await?.map(Resolved::Scheme).as_ref(),
        Format::Jskos,
    )?;
    emit(document, uri)
}

pub async fn concept(backend: &Backend, uri: &str) -> anyhow::Result<u8> {
    let document = render(
        backend,
        backend.get_concept(uri).await?.map(Resolved::Concept).as_ref(),
        Format::Jskos,
    )?;
    emit(document, uri)
}

pub async fn top(backend: &Backend, scheme: &str) -> anyhow::Result<u8> {
    emit_list(backend.get_top_concepts(scheme).await?)
}

pub async fn narrower(backend: &Backend, uri: &str) -> anyhow::Result<u8> {
    emit_list(backend.get_narrower(uri).await?)
}

pub async fn ancestors(backend: &Backend, uri: &str) -> anyhow::Result<u8> {
    emit_list(backend.get_ancestors(uri).await?)
}

/// Log refresh events until Ctrl-C.
pub async fn watch(mut events: broadcast::Receiver<RefreshEvent>) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(RefreshEvent::Stopped) => return Ok(()),
                Ok(event) => info!(?event, "Refresh event"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Missed refresh events");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}
