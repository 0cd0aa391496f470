//! Action bodies attached to transitions (§4.4). Every fallible action
//! returns `Result<(), ActionError>` instead of propagating with `?` out of
//! the dispatcher: a failure here becomes an `InternalError` event, never a
//! panic or an early return out of the event loop.

use callbridge_pvp::{CallParams, CreateTgVoipParams, PvpCallUpdate, PvpClient, PvpUserId};
use callbridge_ssp::{AudioEndpoint, SspCallId, SspClient, SspStatus};

use crate::cache::Cache;
use crate::config::DispatcherConfig;
use crate::context::CallContext;
use crate::error::ActionError;
use crate::rate_limit::RateLimitGate;

use super::resolver;

pub fn store_tg_id(ctx: &mut CallContext, update: &PvpCallUpdate) {
    ctx.pvp_call_id = update.call_id;
}

pub fn store_tg_user_id(ctx: &mut CallContext, user_id: PvpUserId) {
    ctx.pvp_user_id = user_id;
}

pub fn store_sip_id(ctx: &mut CallContext, call_id: SspCallId) {
    ctx.ssp_call_id = call_id;
}

pub fn clean_tg_id(ctx: &mut CallContext) {
    ctx.pvp_call_id = 0;
}

pub fn clean_sip_id(ctx: &mut CallContext) {
    ctx.ssp_call_id = callbridge_ssp::SSP_CALL_ID_INVALID;
}

/// `DialSip`: looks up the peer's profile, builds the diagnostic header set,
/// and dials the SSP side (§4.4).
pub fn dial_sip(
    ctx: &mut CallContext,
    pvp: &dyn PvpClient,
    ssp: &dyn SspClient,
    callback_uri: &str,
) -> Result<(), ActionError> {
    let user = pvp
        .get_user(ctx.pvp_user_id)
        .map_err(|e| ActionError::from_rpc(&e))?;

    let mut headers = callbridge_ssp::SspHeaders {
        gw_context: ctx.id().to_string(),
        tg_id: ctx.pvp_user_id.to_string(),
        ..Default::default()
    };
    if !user.first_name.is_empty() {
        headers.tg_first_name = Some(user.first_name.clone());
    }
    if !user.last_name.is_empty() {
        headers.tg_last_name = Some(user.last_name.clone());
    }
    if !user.username.is_empty() {
        headers.tg_username = Some(user.username.clone());
    }
    if !user.phone.is_empty() {
        headers.tg_phone = Some(user.phone.clone());
    }

    let ssp_call_id = ssp
        .dial(callback_uri, &headers)
        .map_err(|e| ActionError::from_rpc(&e))?;
    ctx.ssp_call_id = ssp_call_id;
    Ok(())
}

/// `AnswerTg`: accepts a PVP-originated call with the fixed protocol
/// capability set (§4.4, §6).
pub fn answer_tg(
    ctx: &CallContext,
    pvp: &dyn PvpClient,
    udp_p2p: bool,
    udp_reflector: bool,
) -> Result<(), ActionError> {
    let params = CallParams::new(udp_p2p, udp_reflector, pvp.max_layer());
    pvp.accept_call(ctx.pvp_call_id, params)
        .map_err(|e| ActionError::from_rpc(&e))
}

/// Parsed form of an SSP extension (§6 grammar).
enum ParsedExtension {
    Username(String),
    Phone(String),
    UserId(PvpUserId),
}

fn parse_extension(extension: &str) -> Option<ParsedExtension> {
    if let Some(username) = extension.strip_prefix("tg#") {
        return Some(ParsedExtension::Username(username.to_string()));
    }
    if let Some(digits) = extension.strip_prefix('+') {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return Some(ParsedExtension::Phone(digits.to_string()));
        }
        return None;
    }
    if !extension.is_empty() && extension.chars().all(|c| c.is_ascii_digit()) {
        let id: PvpUserId = extension.parse().ok()?;
        return Some(ParsedExtension::UserId(id));
    }
    None
}

/// `AcceptIncomingSip`: parses the extension into one of the three resolver
/// hints, stores it on the context, and answers with 180 Ringing. An
/// unparseable extension fails with `BAD_EXTENSION` (§4.4, §6).
pub fn accept_incoming_sip(
    ctx: &mut CallContext,
    ssp: &dyn SspClient,
    extension: &str,
) -> Result<(), ActionError> {
    match parse_extension(extension) {
        Some(ParsedExtension::Username(username)) => ctx.ext_username = username,
        Some(ParsedExtension::Phone(phone)) => ctx.ext_phone = phone,
        Some(ParsedExtension::UserId(id)) => ctx.pvp_user_id = id,
        None => {
            return Err(ActionError::new(
                crate::error::StatusCode::BadExtension,
                format!("unparseable extension {extension:?}"),
            ))
        }
    }
    ssp.answer(ctx.ssp_call_id, &SspStatus::ringing())
        .map_err(|e| ActionError::from_rpc(&e))
}

pub fn answer_sip(ctx: &CallContext, ssp: &dyn SspClient) -> Result<(), ActionError> {
    ssp.answer(ctx.ssp_call_id, &SspStatus::ok())
        .map_err(|e| ActionError::from_rpc(&e))
}

/// `CreateTgVoip`: instantiates the PVP controller from the per-call
/// connection params carried on the `Ready` update plus the static config,
/// then starts and connects it (§4.4, §6).
pub fn create_tg_voip(
    ctx: &mut CallContext,
    pvp: &dyn PvpClient,
    config: &DispatcherConfig,
    update: &PvpCallUpdate,
) -> Result<(), ActionError> {
    let connection = update
        .voip_params
        .clone()
        .ok_or_else(|| ActionError::internal("Ready update carried no voip connection params"))?;

    let params = CreateTgVoipParams {
        connection,
        udp_p2p: config.udp_p2p,
        udp_reflector: config.udp_reflector,
        data_saving: config.voip.data_saving,
        aec_enabled: config.voip.aec_enabled,
        ns_enabled: config.voip.ns_enabled,
        agc_enabled: config.voip.agc_enabled,
        proxy: config.voip.proxy.clone(),
        init_timeout_ms: config.voip.init_timeout_ms,
        recv_timeout_ms: config.voip.recv_timeout_ms,
    };

    let controller = pvp
        .create_controller(params)
        .map_err(|e| ActionError::from_rpc(&e))?;
    controller.start();
    controller.connect();
    ctx.controller = Some(controller);
    Ok(())
}

/// `BridgeAudio`: links the PVP controller's media with the SSP call's
/// audio (§4.4).
pub fn bridge_audio(ctx: &CallContext, ssp: &dyn SspClient) -> Result<(), ActionError> {
    let controller = ctx
        .controller
        .as_ref()
        .ok_or_else(|| ActionError::internal("bridge_audio with no pvp controller"))?;
    let input = AudioEndpoint(controller.input_media().0);
    let output = AudioEndpoint(controller.output_media().0);
    ssp.bridge_audio(ctx.ssp_call_id, input, output)
        .map_err(|e| ActionError::from_rpc(&e))
}

/// `DialDtmf`: forwards the matched text verbatim (§4.4, §6).
pub fn dial_dtmf(ctx: &CallContext, ssp: &dyn SspClient, text: &str) -> Result<(), ActionError> {
    ssp.dial_dtmf(ctx.ssp_call_id, text)
        .map_err(|e| ActionError::from_rpc(&e))
}

/// `DialTg`: see the resolver module (§4.5).
pub fn dial_tg(
    ctx: &mut CallContext,
    pvp: &dyn PvpClient,
    config: &DispatcherConfig,
    cache: &mut Cache,
    rate_limit: &mut RateLimitGate,
) -> Result<(), ActionError> {
    resolver::dial_tg(ctx, pvp, config, cache, rate_limit)
}

/// `SetHangupPrm`: records the reason `CleanUp` will later hand to the SSP
/// side (§4.4).
pub fn set_hangup_prm(ctx: &mut CallContext, status_code: crate::error::StatusCode, reason: &str) {
    ctx.hangup_reason = Some(match status_code {
        crate::error::StatusCode::InternalServerError => SspStatus::internal_server_error(reason),
        crate::error::StatusCode::NotFound => SspStatus::not_found(reason),
        crate::error::StatusCode::BadExtension => SspStatus::bad_extension(reason),
    });
}

/// `CleanUp`: on-entry action of the terminal state. Idempotent — safe to
/// run more than once per context, though the dispatcher only ever runs it
/// once (§4.4, §8 law 6).
pub fn clean_up(ctx: &mut CallContext, pvp: &dyn PvpClient, ssp: &dyn SspClient) {
    if let Some(controller) = ctx.controller.take() {
        controller.stop();
    }
    if ctx.pvp_call_id != 0 {
        let call_id = ctx.pvp_call_id;
        if let Err(e) = pvp.discard_call(call_id, false, 0, call_id) {
            tracing::warn!(ctx_id = ctx.id(), error = %e, "discard_call failed during cleanup, swallowed");
        }
        ctx.pvp_call_id = 0;
    }
    if ctx.ssp_call_id != callbridge_ssp::SSP_CALL_ID_INVALID {
        let status = ctx
            .hangup_reason
            .clone()
            .unwrap_or_else(SspStatus::ok);
        if let Err(e) = ssp.hangup(ctx.ssp_call_id, &status) {
            tracing::warn!(ctx_id = ctx.id(), error = %e, "hangup failed during cleanup, swallowed");
        }
        ctx.ssp_call_id = callbridge_ssp::SSP_CALL_ID_INVALID;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_username_form() {
        match parse_extension("tg#alice").unwrap() {
            ParsedExtension::Username(u) => assert_eq!(u, "alice"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn extension_phone_form() {
        match parse_extension("+123").unwrap() {
            ParsedExtension::Phone(p) => assert_eq!(p, "123"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn extension_bare_digits_is_user_id() {
        match parse_extension("123").unwrap() {
            ParsedExtension::UserId(id) => assert_eq!(id, 123),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn extension_garbage_is_rejected() {
        assert!(parse_extension("abc").is_none());
        assert!(parse_extension("+abc").is_none());
        assert!(parse_extension("").is_none());
    }

    #[test]
    fn clean_up_is_idempotent() {
        use callbridge_pvp::fake::FakePvpClient;
        use callbridge_ssp::fake::FakeSspClient;

        let pvp = FakePvpClient::new();
        let ssp = FakeSspClient::new();
        let mut ctx = CallContext::new();
        ctx.pvp_call_id = 7;
        ctx.ssp_call_id = 3;

        clean_up(&mut ctx, &pvp, &ssp);
        clean_up(&mut ctx, &pvp, &ssp);

        assert_eq!(pvp.discarded_calls().len(), 1);
        assert_eq!(ssp.hangups().len(), 1);
        assert_eq!(ctx.pvp_call_id, 0);
        assert_eq!(ctx.ssp_call_id, callbridge_ssp::SSP_CALL_ID_INVALID);
    }
}
