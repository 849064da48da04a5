use missionsync_core::{
    BeaconContent, Blake3Digester, ContentDigest, CoreError, Digester, FieldValue, PlanContent,
    Position,
};

/// Plan with a `revision` field; bump the revision to change its digest.
pub fn plan(id: &str, revision: i64) -> PlanContent {
    PlanContent::new(id)
        .with_field("revision", FieldValue::Integer(revision))
        .with_field("speed_mps", FieldValue::Float(1.2))
}

pub fn beacon(name: &str, latitude_deg: f64, longitude_deg: f64) -> BeaconContent {
    BeaconContent {
        name: name.to_string(),
        query_channel: 1,
        reply_channel: 2,
        transponder_delay_ms: 0,
        position: Position::new(latitude_deg, longitude_deg, 0.0),
    }
}

/// Refuses plans whose id starts with `broken`, otherwise BLAKE3.
pub fn picky_digester(plan: &PlanContent) -> Result<ContentDigest, CoreError> {
    if plan.plan_id.starts_with("broken") {
        return Err(CoreError::Digest(format!("cannot encode {}", plan.plan_id)));
    }
    Blake3Digester.digest(plan)
}
