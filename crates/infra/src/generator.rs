//! Reward content generators.
//!
//! Resolution order for a reward: the generator config's `type`, then the
//! reward's own `reward_type`, then the template generator which copies
//! `content_config` verbatim and cannot fail. Randomness comes from one seeded
//! `StdRng` owned by the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use marketing_core::UserId;
use marketing_rewards::config::numeric_value;
use marketing_rewards::{Reward, StrategyConfig, reward_type};

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 8;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("failed to encode reward content: {0}")]
    Encode(String),

    #[error("{generator} generator failed: {reason}")]
    Failed { generator: String, reason: String },
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub reward: &'a Reward,
    pub user_id: UserId,
    /// Parameters of the resolved generator; empty when the reward has no config.
    pub config: &'a StrategyConfig,
}

/// Produces the content snapshot (a JSON string) for one grant.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError>;
}

/// `{code, code_type, value}` with an 8-character redeem code.
#[derive(Debug, Default)]
pub struct CodeGenerator;

impl Generator for CodeGenerator {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let code: String = (0..CODE_LENGTH)
            .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
            .collect();
        let content = json!({
            "code": code,
            "code_type": request.config.str_param("code_type", "COUPON"),
            "value": request.config.f64_param("value", 0.0),
        });
        Ok(serde_json::to_string(&content)?)
    }
}

/// `{coupon_id, discount_type, discount_value, min_amount}`.
#[derive(Debug, Default)]
pub struct CouponGenerator;

impl Generator for CouponGenerator {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let coupon_id = uuid::Builder::from_random_bytes(bytes).into_uuid();

        let content = json!({
            "coupon_id": coupon_id.to_string(),
            "discount_type": request.config.str_param("discount_type", "AMOUNT"),
            "discount_value": request.config.f64_param("discount_value", 0.0),
            "min_amount": request.config.f64_param("min_amount", 0.0),
        });
        Ok(serde_json::to_string(&content)?)
    }
}

/// `{points, points_type}`; `points` falls back to `content_config.points`.
#[derive(Debug, Default)]
pub struct PointsGenerator;

impl Generator for PointsGenerator {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let mut points = request.config.f64_param("points", 0.0);
        if points <= 0.0 {
            if let Some(p) = request
                .reward
                .content_config
                .get("points")
                .and_then(numeric_value)
            {
                points = p;
            }
        }
        let content = json!({
            "points": points,
            "points_type": request.config.str_param("points_type", "CASH"),
        });
        Ok(serde_json::to_string(&content)?)
    }
}

/// The reward's `content_config`, as is.
#[derive(Debug, Default)]
pub struct TemplateContentGenerator;

impl Generator for TemplateContentGenerator {
    fn generate(
        &self,
        request: &GenerationRequest<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        Ok(serde_json::to_string(&request.reward.content_config)?)
    }
}

pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn Generator>>,
    fallback: Arc<dyn Generator>,
    rng: Mutex<StdRng>,
}

impl GeneratorRegistry {
    /// Registry with the built-in `CODE`, `COUPON` and `POINTS` generators.
    pub fn new(rng: StdRng) -> Self {
        let mut registry = Self {
            generators: HashMap::new(),
            fallback: Arc::new(TemplateContentGenerator),
            rng: Mutex::new(rng),
        };
        registry.register("CODE", Arc::new(CodeGenerator));
        registry.register(reward_type::COUPON, Arc::new(CouponGenerator));
        registry.register(reward_type::POINTS, Arc::new(PointsGenerator));
        registry
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn register(&mut self, kind: impl Into<String>, generator: Arc<dyn Generator>) {
        self.generators.insert(kind.into(), generator);
    }

    /// The tag and generator that will handle `reward` under `config`.
    pub fn resolve(
        &self,
        reward: &Reward,
        config: Option<&StrategyConfig>,
    ) -> (String, Arc<dyn Generator>) {
        if let Some(kind) = config.and_then(|c| c.kind.as_deref()) {
            if let Some(generator) = self.generators.get(kind) {
                return (kind.to_string(), generator.clone());
            }
            warn!(generator = %kind, reward_id = %reward.id, "unknown generator type; falling back");
        }

        let by_reward_type = match reward.reward_type.as_str() {
            reward_type::REDEEM_CODE => "CODE",
            other => other,
        };
        match self.generators.get(by_reward_type) {
            Some(generator) => (by_reward_type.to_string(), generator.clone()),
            None => ("TEMPLATE".to_string(), self.fallback.clone()),
        }
    }

    pub fn generate(
        &self,
        reward: &Reward,
        user_id: UserId,
        config: Option<&StrategyConfig>,
    ) -> Result<String, GenerationError> {
        let (_, generator) = self.resolve(reward, config);
        let empty = StrategyConfig::default();
        let request = GenerationRequest {
            reward,
            user_id,
            config: config.unwrap_or(&empty),
        };
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        generator.generate(&request, &mut *rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketing_core::{AppId, RewardId, TenantId};
    use serde_json::Value as JsonValue;

    fn registry() -> GeneratorRegistry {
        GeneratorRegistry::new(StdRng::seed_from_u64(7))
    }

    fn reward(kind: &str) -> Reward {
        let mut reward = Reward::new(
            RewardId::new("r-1"),
            TenantId::new("t1"),
            AppId::new("shop"),
            kind,
            "reward",
        );
        reward.content_config = json!({"points": 250, "note": "template"});
        reward
    }

    fn parse(content: &str) -> JsonValue {
        serde_json::from_str(content).unwrap()
    }

    #[test]
    fn code_generator_emits_eight_unambiguous_characters() {
        let config = StrategyConfig::parse(r#"{"type":"CODE","value":5}"#).unwrap();
        let content = parse(
            &registry()
                .generate(&reward(reward_type::COUPON), UserId::new(1), Some(&config))
                .unwrap(),
        );

        let code = content["code"].as_str().unwrap();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(content["code_type"], "COUPON");
        assert_eq!(content["value"], 5.0);
    }

    #[test]
    fn same_seed_generates_same_codes() {
        let config = StrategyConfig::parse(r#"{"type":"CODE"}"#).unwrap();
        let r = reward(reward_type::REDEEM_CODE);
        let a = registry().generate(&r, UserId::new(1), Some(&config)).unwrap();
        let b = registry().generate(&r, UserId::new(1), Some(&config)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reward_type_is_the_second_choice() {
        let content = parse(
            &registry()
                .generate(&reward(reward_type::REDEEM_CODE), UserId::new(1), None)
                .unwrap(),
        );
        assert!(content["code"].is_string());

        let content = parse(
            &registry()
                .generate(&reward(reward_type::COUPON), UserId::new(1), None)
                .unwrap(),
        );
        assert!(content["coupon_id"].as_str().unwrap().parse::<uuid::Uuid>().is_ok());
        assert_eq!(content["discount_type"], "AMOUNT");
    }

    #[test]
    fn unknown_types_fall_back_to_template_content() {
        let config = StrategyConfig::parse(r#"{"type":"NFT"}"#).unwrap();
        let (kind, _) = registry().resolve(&reward(reward_type::SUBSCRIPTION), Some(&config));
        assert_eq!(kind, "TEMPLATE");

        let content = parse(
            &registry()
                .generate(&reward(reward_type::SUBSCRIPTION), UserId::new(1), Some(&config))
                .unwrap(),
        );
        assert_eq!(content["note"], "template");
    }

    #[test]
    fn points_fall_back_to_template_points() {
        let content = parse(
            &registry()
                .generate(&reward(reward_type::POINTS), UserId::new(1), None)
                .unwrap(),
        );
        assert_eq!(content["points"], 250.0);
        assert_eq!(content["points_type"], "CASH");

        let config = StrategyConfig::parse(r#"{"points":10,"points_type":"BONUS"}"#).unwrap();
        let content = parse(
            &registry()
                .generate(&reward(reward_type::POINTS), UserId::new(1), Some(&config))
                .unwrap(),
        );
        assert_eq!(content["points"], 10.0);
        assert_eq!(content["points_type"], "BONUS");
    }
}
