//! The `DialTg` action (§4.5): resolves whichever hint an SSP-originated
//! context carries into a PVP user id, then dials. Consults the rate-limit
//! gate before doing any network work and parses its own failures back into
//! gate updates.

use std::time::Instant;

use callbridge_pvp::{CallParams, PvpClient};

use crate::cache::Cache;
use crate::config::DispatcherConfig;
use crate::context::CallContext;
use crate::error::{ActionError, StatusCode};
use crate::rate_limit::RateLimitGate;

pub fn dial_tg(
    ctx: &mut CallContext,
    pvp: &dyn PvpClient,
    config: &DispatcherConfig,
    cache: &mut Cache,
    rate_limit: &mut RateLimitGate,
) -> Result<(), ActionError> {
    let now = Instant::now();
    if let Some(remaining) = rate_limit.remaining(now) {
        return Err(ActionError::internal(format!(
            "FLOOD_WAIT {}",
            remaining.as_secs()
        )));
    }

    let user_id = if !ctx.ext_username.is_empty() {
        resolve_username(ctx, pvp, cache)?
    } else if !ctx.ext_phone.is_empty() {
        resolve_phone(ctx, pvp, cache)?
    } else {
        ctx.pvp_user_id
    };

    dial_by_id(ctx, pvp, config, rate_limit, user_id)
}

fn resolve_username(
    ctx: &CallContext,
    pvp: &dyn PvpClient,
    cache: &mut Cache,
) -> Result<callbridge_pvp::PvpUserId, ActionError> {
    if let Some(id) = cache.username_get(&ctx.ext_username) {
        return Ok(id);
    }
    let chat = pvp
        .search_public_chat(&ctx.ext_username)
        .map_err(|e| ActionError::from_rpc(&e))?;
    if chat.chat_type != callbridge_pvp::PvpChatType::Private {
        return Err(ActionError::internal(format!(
            "searchPublicChat; {} is not a private chat",
            ctx.ext_username
        )));
    }
    cache.username_insert(ctx.ext_username.clone(), chat.user_id);
    Ok(chat.user_id)
}

fn resolve_phone(
    ctx: &CallContext,
    pvp: &dyn PvpClient,
    cache: &mut Cache,
) -> Result<callbridge_pvp::PvpUserId, ActionError> {
    if let Some(id) = cache.phone_get(&ctx.ext_phone) {
        return Ok(id);
    }
    let id = pvp
        .import_contacts(&ctx.ext_phone)
        .map_err(|e| ActionError::from_rpc(&e))?;
    if id == 0 {
        return Err(ActionError::new(StatusCode::NotFound, "not registered"));
    }
    cache.phone_insert(ctx.ext_phone.clone(), id);
    Ok(id)
}

fn dial_by_id(
    ctx: &mut CallContext,
    pvp: &dyn PvpClient,
    config: &DispatcherConfig,
    rate_limit: &mut RateLimitGate,
    user_id: callbridge_pvp::PvpUserId,
) -> Result<(), ActionError> {
    let params = CallParams::new(config.udp_p2p, config.udp_reflector, pvp.max_layer());
    match pvp.create_call(user_id, params) {
        Ok(call_id) => {
            ctx.pvp_call_id = call_id;
            Ok(())
        }
        Err(e) => {
            let message = e.to_string();
            rate_limit.observe_error(Instant::now(), &message);
            Err(ActionError::internal(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use callbridge_pvp::fake::FakePvpClient;
    use callbridge_pvp::{PvpChat, PvpChatType, PvpUser};

    use super::*;

    fn gate() -> RateLimitGate {
        RateLimitGate::new(Duration::from_secs(30), Duration::from_secs(86_400))
    }

    #[test]
    fn username_cache_miss_resolves_then_caches() {
        let pvp = FakePvpClient::new();
        pvp.add_public_chat(
            "alice",
            PvpChat {
                user_id: 42,
                chat_type: PvpChatType::Private,
            },
        );
        let cfg = DispatcherConfig::default();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut ctx = CallContext::new();
        ctx.ext_username = "alice".to_string();

        dial_tg(&mut ctx, &pvp, &cfg, &mut cache, &mut rl).unwrap();
        assert_ne!(ctx.pvp_call_id, 0);
        assert_eq!(pvp.created_calls()[0].0, 42);
        assert_eq!(cache.username_get("alice"), Some(42));
    }

    #[test]
    fn dial_by_id_uses_configured_p2p_and_reflector_flags() {
        let pvp = FakePvpClient::new();
        pvp.add_phone_import("+1", 7);
        let cfg = DispatcherConfig {
            udp_p2p: false,
            udp_reflector: true,
            ..Default::default()
        };
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut ctx = CallContext::new();
        ctx.ext_phone = "+1".to_string();

        dial_tg(&mut ctx, &pvp, &cfg, &mut cache, &mut rl).unwrap();
        let (_, params) = pvp.created_calls()[0];
        assert!(!params.udp_p2p);
        assert!(params.udp_reflector);
        assert_eq!(params.max_layer, pvp.max_layer());
    }

    #[test]
    fn phone_resolves_to_zero_is_not_found() {
        let pvp = FakePvpClient::new();
        let cfg = DispatcherConfig::default();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut ctx = CallContext::new();
        ctx.ext_phone = "999".to_string();

        let err = dial_tg(&mut ctx, &pvp, &cfg, &mut cache, &mut rl).unwrap_err();
        assert_eq!(err.status_code, StatusCode::NotFound);
    }

    #[test]
    fn two_consecutive_dials_to_same_phone_hit_cache_once() {
        let pvp = FakePvpClient::new();
        pvp.add_phone_import("+1", 7);
        let cfg = DispatcherConfig::default();
        let mut cache = Cache::new();
        let mut rl = gate();

        let mut ctx_a = CallContext::new();
        ctx_a.ext_phone = "+1".to_string();
        dial_tg(&mut ctx_a, &pvp, &cfg, &mut cache, &mut rl).unwrap();

        let mut ctx_b = CallContext::new();
        ctx_b.ext_phone = "+1".to_string();
        dial_tg(&mut ctx_b, &pvp, &cfg, &mut cache, &mut rl).unwrap();

        assert_eq!(cache.phone_get("+1"), Some(7));
    }

    #[test]
    fn blocked_gate_rejects_without_network_call() {
        let pvp = FakePvpClient::new();
        let cfg = DispatcherConfig::default();
        let mut cache = Cache::new();
        let mut rl = gate();
        rl.observe_error(Instant::now(), "Too Many Requests: retry after 5");
        let mut ctx = CallContext::new();
        ctx.pvp_user_id = 1;

        let err = dial_tg(&mut ctx, &pvp, &cfg, &mut cache, &mut rl).unwrap_err();
        assert!(err.reason.starts_with("FLOOD_WAIT"));
        assert_eq!(pvp.created_calls().len(), 0);
    }

    #[test]
    fn rate_limited_create_call_updates_gate() {
        let pvp = FakePvpClient::new();
        pvp.queue_create_call_error("Too Many Requests: retry after 7");
        let cfg = DispatcherConfig::default();
        let mut cache = Cache::new();
        let mut rl = gate();
        let mut ctx = CallContext::new();
        ctx.pvp_user_id = 1;

        dial_tg(&mut ctx, &pvp, &cfg, &mut cache, &mut rl).unwrap_err();
        assert!(rl.is_blocked(Instant::now()));
    }
}
