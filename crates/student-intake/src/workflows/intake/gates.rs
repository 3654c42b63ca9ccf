use std::fmt;

use serde::Serialize;

use super::documents::DocumentPolicy;
use super::domain::{DocumentKind, FormSnapshot, IntakeStage};

/// Field (or field group) that blocks a stage from being left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    FirstName,
    LastName,
    NationalId,
    Email,
    Phone,
    Institution,
    StudentNumber,
    Faculty,
    YearOfStudy,
    AidSource,
    /// Either the NSFAS flag or a declared guardian income bracket.
    NsfasOrGuardianIncome,
    HousingChoice,
    RoomType,
    GuarantorName,
    GuarantorNationalId,
    GuarantorPhone,
    Document(DocumentKind),
    InformationConfirmed,
}

impl RequiredField {
    pub fn label(self) -> &'static str {
        match self {
            Self::FirstName => "first name",
            Self::LastName => "last name",
            Self::NationalId => "ID number",
            Self::Email => "email address",
            Self::Phone => "phone number",
            Self::Institution => "university",
            Self::StudentNumber => "student number",
            Self::Faculty => "faculty",
            Self::YearOfStudy => "year of study",
            Self::AidSource => "financial aid source",
            Self::NsfasOrGuardianIncome => "NSFAS application or guardian income",
            Self::HousingChoice => "at least one residence",
            Self::RoomType => "room type preference",
            Self::GuarantorName => "guardian name",
            Self::GuarantorNationalId => "guardian ID number",
            Self::GuarantorPhone => "guardian phone number",
            Self::Document(kind) => kind.label(),
            Self::InformationConfirmed => "information confirmation",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type Check = fn(&FormSnapshot) -> bool;

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

const IDENTITY: &[(RequiredField, Check)] = &[
    (RequiredField::FirstName, |s: &FormSnapshot| filled(&s.identity.first_name)),
    (RequiredField::LastName, |s: &FormSnapshot| filled(&s.identity.last_name)),
    (RequiredField::NationalId, |s: &FormSnapshot| filled(&s.identity.national_id)),
    (RequiredField::Email, |s: &FormSnapshot| filled(&s.identity.email)),
    (RequiredField::Phone, |s: &FormSnapshot| filled(&s.identity.phone)),
];

const ACADEMIC: &[(RequiredField, Check)] = &[
    (RequiredField::Institution, |s: &FormSnapshot| filled(&s.academic.institution)),
    (RequiredField::StudentNumber, |s: &FormSnapshot| {
        filled(&s.academic.student_number)
    }),
    (RequiredField::Faculty, |s: &FormSnapshot| filled(&s.academic.faculty)),
    (RequiredField::YearOfStudy, |s: &FormSnapshot| {
        s.academic.year_of_study.is_some()
    }),
];

const FINANCIAL: &[(RequiredField, Check)] = &[
    (RequiredField::AidSource, |s: &FormSnapshot| s.financial.aid_source.is_some()),
    (RequiredField::NsfasOrGuardianIncome, |s: &FormSnapshot| {
        s.financial.nsfas_applicant || s.financial.guardian_income.is_some()
    }),
];

const HOUSING: &[(RequiredField, Check)] = &[
    (RequiredField::HousingChoice, |s: &FormSnapshot| !s.housing_choices.is_empty()),
    (RequiredField::RoomType, |s: &FormSnapshot| s.preferences.room_type.is_some()),
];

const GUARANTOR: &[(RequiredField, Check)] = &[
    (RequiredField::GuarantorName, |s: &FormSnapshot| filled(&s.guarantor.name)),
    (RequiredField::GuarantorNationalId, |s: &FormSnapshot| {
        filled(&s.guarantor.national_id)
    }),
    (RequiredField::GuarantorPhone, |s: &FormSnapshot| filled(&s.guarantor.phone)),
];

const REVIEW: &[(RequiredField, Check)] =
    &[(RequiredField::InformationConfirmed, |s: &FormSnapshot| s.information_confirmed)];

/// Per-stage completeness predicates.
///
/// Field stages are fixed conjunctions; the document stage defers to the
/// [`DocumentPolicy`] so conditional requirements stay in one place.
#[derive(Debug, Clone, Default)]
pub struct StageGates {
    documents: DocumentPolicy,
}

impl StageGates {
    pub fn new(documents: DocumentPolicy) -> Self {
        Self { documents }
    }

    pub fn document_policy(&self) -> &DocumentPolicy {
        &self.documents
    }

    pub fn can_advance(&self, stage: IntakeStage, snapshot: &FormSnapshot) -> bool {
        self.missing_fields(stage, snapshot).is_empty()
    }

    /// Every unmet requirement of `stage`, in display order.
    pub fn missing_fields(&self, stage: IntakeStage, snapshot: &FormSnapshot) -> Vec<RequiredField> {
        let checks = match stage {
            IntakeStage::Identity => IDENTITY,
            IntakeStage::Academic => ACADEMIC,
            IntakeStage::Financial => FINANCIAL,
            IntakeStage::Housing => HOUSING,
            IntakeStage::Guarantor => GUARANTOR,
            IntakeStage::Review => REVIEW,
            IntakeStage::Documents => {
                return self
                    .documents
                    .outstanding_kinds(snapshot)
                    .into_iter()
                    .map(RequiredField::Document)
                    .collect();
            }
        };

        checks
            .iter()
            .filter(|(_, check)| !check(snapshot))
            .map(|(field, _)| *field)
            .collect()
    }

    /// First stage before `target` whose gate does not hold.
    pub fn first_incomplete_before(
        &self,
        target: IntakeStage,
        snapshot: &FormSnapshot,
    ) -> Option<(IntakeStage, Vec<RequiredField>)> {
        IntakeStage::ordered()
            .into_iter()
            .take_while(|stage| *stage < target)
            .find_map(|stage| {
                let missing = self.missing_fields(stage, snapshot);
                (!missing.is_empty()).then_some((stage, missing))
            })
    }
}

/// Gate check under the default document policy.
pub fn can_advance(stage: IntakeStage, snapshot: &FormSnapshot) -> bool {
    StageGates::default().can_advance(stage, snapshot)
}
