use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::selection::BoundedSelection;

/// Maximum number of residences an applicant may rank.
pub const MAX_HOUSING_CHOICES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    Identity,
    Academic,
    Financial,
    Housing,
    Guarantor,
    Documents,
    Review,
}

impl IntakeStage {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Identity,
            Self::Academic,
            Self::Financial,
            Self::Housing,
            Self::Guarantor,
            Self::Documents,
            Self::Review,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Identity => "Personal Information",
            Self::Academic => "Academic Details",
            Self::Financial => "Financial Information",
            Self::Housing => "Accommodation Preferences",
            Self::Guarantor => "Parent/Guardian Details",
            Self::Documents => "Document Upload",
            Self::Review => "Review & Submit",
        }
    }

    /// One-based position used in progress indicators.
    pub const fn position(self) -> usize {
        self as usize + 1
    }

    pub fn next(self) -> Option<Self> {
        Self::ordered().get(self as usize + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        (self as usize)
            .checked_sub(1)
            .and_then(|index| Self::ordered().get(index).copied())
    }
}

impl fmt::Display for IntakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Catalog identifier of a residence the applicant can rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HousingOptionId(pub u64);

impl fmt::Display for HousingOptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Residence listing as served by the property catalog.
///
/// Listings without a published price range carry `None` for either bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousingOption {
    pub id: HousingOptionId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub price_min: Option<u32>,
    #[serde(default)]
    pub price_max: Option<u32>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub nsfas_accredited: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Opaque reference handed back by the submission backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationReference(pub String);

impl fmt::Display for ApplicationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityDetails {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub nationality: String,
    pub emergency_contact: EmergencyContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearOfStudy {
    FirstYear,
    SecondYear,
    ThirdYear,
    FourthYear,
    Honours,
    Masters,
    Phd,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcademicDetails {
    pub institution: String,
    pub student_number: String,
    pub faculty: String,
    pub year_of_study: Option<YearOfStudy>,
    pub degree_program: String,
    pub expected_completion: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AidSource {
    Nsfas,
    Bursary,
    StudentLoan,
    SelfFunded,
    ParentFunded,
    Other,
}

/// Declared annual parent/guardian income in rand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeBracket {
    #[serde(rename = "0-50000")]
    R0To50k,
    #[serde(rename = "50000-100000")]
    R50kTo100k,
    #[serde(rename = "100000-200000")]
    R100kTo200k,
    #[serde(rename = "200000-350000")]
    R200kTo350k,
    #[serde(rename = "350000+")]
    R350kPlus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankingDetails {
    pub bank_name: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialDetails {
    pub aid_source: Option<AidSource>,
    pub nsfas_applicant: bool,
    pub guardian_income: Option<IncomeBracket>,
    pub banking: BankingDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Single,
    Shared,
    Apartment,
    NoPreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryRequirement {
    Vegetarian,
    Vegan,
    Halal,
    Kosher,
    GlutenFree,
    Other,
}

/// Free-form preferences that sit next to the ranked residences.
///
/// The ranked residences themselves are only mutated through toggles so the
/// capacity rule cannot be bypassed by a bulk update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousingPreferences {
    pub room_type: Option<RoomType>,
    pub dietary: Option<DietaryRequirement>,
    pub special_requirements: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuarantorDetails {
    pub name: String,
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    StudentCard,
    StudentId,
    GuardianId,
    RegistrationProof,
    BankStatement,
    NsfasLetter,
    MedicalCertificate,
}

impl DocumentKind {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::StudentCard,
            Self::StudentId,
            Self::GuardianId,
            Self::RegistrationProof,
            Self::BankStatement,
            Self::NsfasLetter,
            Self::MedicalCertificate,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::StudentCard => "Student Card",
            Self::StudentId => "Student ID Document",
            Self::GuardianId => "Parent/Guardian ID",
            Self::RegistrationProof => "Proof of Registration",
            Self::BankStatement => "Bank Statement (Last 3 months)",
            Self::NsfasLetter => "NSFAS Approval Letter",
            Self::MedicalCertificate => "Medical Certificate",
        }
    }
}

/// Metadata describing an uploaded file; contents never pass through intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

/// Total mapping from every document kind to an attachment or explicit absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSlots(BTreeMap<DocumentKind, Option<Attachment>>);

impl Default for DocumentSlots {
    fn default() -> Self {
        Self(
            DocumentKind::ordered()
                .into_iter()
                .map(|kind| (kind, None))
                .collect(),
        )
    }
}

impl DocumentSlots {
    pub fn get(&self, kind: DocumentKind) -> Option<&Attachment> {
        self.0.get(&kind).and_then(Option::as_ref)
    }

    pub fn is_attached(&self, kind: DocumentKind) -> bool {
        self.get(kind).is_some()
    }

    pub(crate) fn set(&mut self, kind: DocumentKind, attachment: Option<Attachment>) {
        self.0.insert(kind, attachment);
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentKind, Option<&Attachment>)> {
        self.0.iter().map(|(kind, slot)| (*kind, slot.as_ref()))
    }

    pub fn presence(&self) -> BTreeMap<DocumentKind, bool> {
        self.0
            .iter()
            .map(|(kind, slot)| (*kind, slot.is_some()))
            .collect()
    }
}

/// Everything collected so far, partitioned by the stage that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormSnapshot {
    pub identity: IdentityDetails,
    pub academic: AcademicDetails,
    pub financial: FinancialDetails,
    pub housing_choices: BoundedSelection<HousingOptionId, MAX_HOUSING_CHOICES>,
    pub preferences: HousingPreferences,
    pub guarantor: GuarantorDetails,
    pub documents: DocumentSlots,
    pub information_confirmed: bool,
}

/// Replacement for one stage's worth of fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "section", rename_all = "snake_case")]
pub enum SectionUpdate {
    Identity(IdentityDetails),
    Academic(AcademicDetails),
    Financial(FinancialDetails),
    Preferences(HousingPreferences),
    Guarantor(GuarantorDetails),
    Confirmation { confirmed: bool },
}

impl SectionUpdate {
    pub(crate) fn apply(self, snapshot: &mut FormSnapshot) {
        match self {
            SectionUpdate::Identity(details) => snapshot.identity = details,
            SectionUpdate::Academic(details) => snapshot.academic = details,
            SectionUpdate::Financial(details) => snapshot.financial = details,
            SectionUpdate::Preferences(details) => snapshot.preferences = details,
            SectionUpdate::Guarantor(details) => snapshot.guarantor = details,
            SectionUpdate::Confirmation { confirmed } => {
                snapshot.information_confirmed = confirmed
            }
        }
    }
}
