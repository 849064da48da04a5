use crate::content::PlanContent;
use crate::error::CoreError;
use crate::ids::ContentDigest;

/// Content hashing used to decide whether a local plan matches the vehicle's copy.
pub trait Digester: Send {
    fn digest(&self, plan: &PlanContent) -> Result<ContentDigest, CoreError>;
}

impl<F> Digester for F
where
    F: Fn(&PlanContent) -> Result<ContentDigest, CoreError> + Send,
{
    fn digest(&self, plan: &PlanContent) -> Result<ContentDigest, CoreError> {
        self(plan)
    }
}

/// BLAKE3 over the plan's canonical MessagePack encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Digester;

impl Digester for Blake3Digester {
    fn digest(&self, plan: &PlanContent) -> Result<ContentDigest, CoreError> {
        let bytes = plan.canonical_bytes()?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&bytes);
        Ok(ContentDigest::from_bytes(hasher.finalize().as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_value::FieldValue;

    #[test]
    fn equal_plans_hash_equal() {
        let a = PlanContent::new("p1").with_field("depth", FieldValue::Integer(2));
        let b = PlanContent::new("p1").with_field("depth", FieldValue::Integer(2));
        let digester = Blake3Digester;
        assert_eq!(digester.digest(&a).unwrap(), digester.digest(&b).unwrap());
        assert_eq!(digester.digest(&a).unwrap().as_bytes().len(), 32);
    }

    #[test]
    fn changed_field_changes_digest() {
        let a = PlanContent::new("p1").with_field("depth", FieldValue::Integer(2));
        let b = PlanContent::new("p1").with_field("depth", FieldValue::Integer(3));
        let digester = Blake3Digester;
        assert_ne!(digester.digest(&a).unwrap(), digester.digest(&b).unwrap());
    }

    #[test]
    fn closures_are_digesters() {
        let fixed = |_: &PlanContent| Ok::<_, CoreError>(ContentDigest::from_bytes(vec![0xAA]));
        let digest = fixed.digest(&PlanContent::new("p1")).unwrap();
        assert_eq!(digest.as_bytes(), &[0xAA]);
    }
}
