//! Resolvers for the device API.

use crate::auth::TokenService;
use crate::context::RequestContext;
use crate::error::{ServerError, ServerResult};
use crate::gate::{require_login, resolver};
use crate::schema::Schema;
use homegate_protocol::{ApiRequest, DeviceState, LIGHT_LEVEL_MAX};
use serde_json::Value;
use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;
use tracing::info;

/// Builds the device API schema.
///
/// `isLoggedIn` and `login` are open; every field touching the gateway is
/// wrapped in `require_login`.
pub fn device_schema(tokens: Arc<TokenService>) -> Schema {
    Schema::builder()
        .query("isLoggedIn", resolver(|ctx, _| Ok(Value::Bool(ctx.is_logged_in()))))
        .query("devices", require_login(resolver(devices)))
        .query("device", require_login(resolver(device)))
        .mutation("login", resolver(move |_, request| login(&tokens, request)))
        .mutation("setDeviceState", require_login(resolver(set_device_state)))
        .build()
}

fn login(tokens: &TokenService, request: &ApiRequest) -> ServerResult<Value> {
    let password = request.string_argument("password")?;
    match tokens.login(password) {
        Some(token) => {
            info!("login succeeded");
            Ok(Value::String(token.into_string()))
        }
        None => {
            info!("login failed");
            Err(ServerError::AuthenticationFailed)
        }
    }
}

fn devices(ctx: &RequestContext, _request: &ApiRequest) -> ServerResult<Value> {
    let devices = ctx.gateway().devices()?;
    Ok(serde_json::to_value(devices)?)
}

fn device(ctx: &RequestContext, request: &ApiRequest) -> ServerResult<Value> {
    let id = request.string_argument("id")?;
    let device = ctx
        .gateway()
        .device(id)?
        .ok_or_else(|| ServerError::NotFound(id.to_string()))?;
    Ok(serde_json::to_value(device)?)
}

fn set_device_state(ctx: &RequestContext, request: &ApiRequest) -> ServerResult<Value> {
    let id = request.string_argument("id")?;
    let patch = parse_patch(request)?;
    if patch.is_empty() {
        return Err(ServerError::InvalidRequest("no attributes to change".into()));
    }

    let device = ctx.gateway().command(id, &patch)?;
    Ok(serde_json::to_value(device)?)
}

/// Extracts and range-checks the state attributes of `setDeviceState`.
pub fn parse_patch(request: &ApiRequest) -> ServerResult<DeviceState> {
    let light_level = match request.number_argument("lightLevel")? {
        Some(level) if (0.0..=f64::from(LIGHT_LEVEL_MAX)).contains(&level) => {
            Some(level.round() as u8)
        }
        Some(level) => {
            return Err(ServerError::InvalidRequest(format!(
                "lightLevel {level} outside 0..={LIGHT_LEVEL_MAX}"
            )))
        }
        None => None,
    };

    Ok(DeviceState {
        is_on: request.bool_argument("isOn")?,
        light_level,
        hue: ranged(request, "hue", 0.0..360.0)?,
        saturation: ranged(request, "saturation", 0.0..=1.0)?,
        temperature: ranged(request, "temperature", 1.0..=100_000.0)?,
    })
}

fn ranged<R>(request: &ApiRequest, name: &str, range: R) -> ServerResult<Option<f64>>
where
    R: RangeBounds<f64> + fmt::Debug,
{
    match request.number_argument(name)? {
        Some(v) if range.contains(&v) => Ok(Some(v)),
        Some(v) => Err(ServerError::InvalidRequest(format!(
            "{name} {v} outside {range:?}"
        ))),
        None => Ok(None),
    }
}
