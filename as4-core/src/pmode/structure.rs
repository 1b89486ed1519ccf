//! Profile-independent structural checks of a PMode

use super::{Mep, MepBinding, PMode};
use thiserror::Error;

/// A structural defect that makes a PMode unusable under any profile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("PMode has an empty id")]
    MissingId,

    #[error("PMode '{0}' has no leg 1")]
    MissingLeg1(String),

    #[error("PMode '{0}' is two-way but has no leg 2")]
    MissingLeg2(String),

    #[error("PMode '{0}' is one-way but defines a leg 2")]
    UnexpectedLeg2(String),

    #[error("PMode '{pmode}' combines MEP {mep} with binding {binding}")]
    InvalidMepBinding {
        pmode: String,
        mep: Mep,
        binding: MepBinding,
    },

    #[error("PMode '{pmode}' has an {role} without party id")]
    EmptyPartyId { pmode: String, role: &'static str },
}

/// Run all structural checks on one PMode, collecting every defect
pub fn validate_structure(pmode: &PMode) -> Vec<StructuralError> {
    let mut errors = Vec::new();
    let id = pmode.id.clone();

    if pmode.id.trim().is_empty() {
        errors.push(StructuralError::MissingId);
    }

    if pmode.leg1.is_none() {
        errors.push(StructuralError::MissingLeg1(id.clone()));
    }

    let expected_legs = match pmode.mep {
        Mep::OneWay => 1,
        Mep::TwoWay => 2,
    };
    if pmode.mep_binding.leg_count() != expected_legs {
        errors.push(StructuralError::InvalidMepBinding {
            pmode: id.clone(),
            mep: pmode.mep,
            binding: pmode.mep_binding,
        });
    }

    match (pmode.mep, pmode.leg2.is_some()) {
        (Mep::TwoWay, false) => errors.push(StructuralError::MissingLeg2(id.clone())),
        (Mep::OneWay, true) => errors.push(StructuralError::UnexpectedLeg2(id.clone())),
        _ => {}
    }

    for (role, party) in [("initiator", &pmode.initiator), ("responder", &pmode.responder)] {
        if let Some(party) = party {
            if party.id_value.trim().is_empty() {
                errors.push(StructuralError::EmptyPartyId {
                    pmode: id.clone(),
                    role,
                });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmode::{Leg, Party};

    fn one_way() -> PMode {
        PMode::one_way_push(
            "pm-1",
            Party::new(None, "sender", "r"),
            Party::new(None, "receiver", "r"),
            Leg::default(),
        )
    }

    #[test]
    fn test_valid_one_way() {
        assert!(validate_structure(&one_way()).is_empty());
        assert!(validate_structure(&one_way().with_mep(Mep::OneWay, MepBinding::Pull)).is_empty());
    }

    #[test]
    fn test_two_way_requires_leg2() {
        let pmode = one_way().with_mep(Mep::TwoWay, MepBinding::PushPush);
        assert_eq!(
            validate_structure(&pmode),
            vec![StructuralError::MissingLeg2("pm-1".to_string())]
        );

        let pmode = pmode.with_leg2(Leg::default());
        assert!(validate_structure(&pmode).is_empty());
    }

    #[test]
    fn test_invalid_binding_combinations() {
        let pmode = one_way().with_mep(Mep::OneWay, MepBinding::PushPush);
        let errors = validate_structure(&pmode);
        assert!(matches!(errors[0], StructuralError::InvalidMepBinding { .. }));

        let pmode = one_way()
            .with_mep(Mep::TwoWay, MepBinding::Push)
            .with_leg2(Leg::default());
        assert_eq!(validate_structure(&pmode).len(), 1);
    }

    #[test]
    fn test_collects_every_defect() {
        let mut pmode = one_way().with_leg2(Leg::default());
        pmode.id = " ".to_string();
        pmode.leg1 = None;
        pmode.responder = Some(Party::new(None, "", "r"));

        let errors = validate_structure(&pmode);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&StructuralError::MissingId));
        assert!(errors.iter().any(|e| matches!(e, StructuralError::EmptyPartyId { role: "responder", .. })));
    }
}
