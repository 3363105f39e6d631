//! Pattern library: per-source detection indicators and field rules
//!
//! Pure data. Rules for a field are tried in order and the first match
//! wins, so each list runs from the most specific to the most general.
//! Patterns are compiled case-insensitive and multi-line; `[ \t]` is used
//! instead of `\s` wherever a rule must not run onto the next line.

use crate::types::LeadSource;

/// One piece of evidence that an email came from a given source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorSpec {
    /// Sender address belongs to this domain (or a subdomain)
    SenderDomain(&'static str),
    /// Regex over the subject line
    Subject(&'static str),
    /// Regex over the plain-text body
    Body(&'static str),
}

/// Ordered extraction rules per logical field.
///
/// Each rule must have exactly one capture group holding the value.
#[derive(Debug, Clone, Copy)]
pub struct FieldPatterns {
    pub reference: &'static [&'static str],
    /// Full name, split into first name and remainder after matching
    pub full_name: &'static [&'static str],
    /// Used only when no `full_name` rule matches
    pub first_name: &'static [&'static str],
    pub last_name: &'static [&'static str],
    pub email: &'static [&'static str],
    pub telephone: &'static [&'static str],
    pub mobile: &'static [&'static str],
    /// `(key, rule)` pairs for source-specific extras
    pub custom: &'static [(&'static str, &'static str)],
}

/// Everything the library knows about one source
#[derive(Debug, Clone, Copy)]
pub struct SourceSpec {
    pub source: LeadSource,
    /// Parser identity recorded on the lead
    pub parser: &'static str,
    pub indicators: &'static [IndicatorSpec],
    /// Content markers used by the parser's own applicability check
    pub markers: &'static [&'static str],
    pub fields: FieldPatterns,
}

const EMAIL_LABELLED: &str = r"^[ \t]*E-?mail(?:[ \t]+Address)?[ \t]*:[ \t]*<?([^\s<>]+@[^\s<>]+)";
const NAME_LABELLED: &str = r"^[ \t]*Name[ \t]*:[ \t]*(.+?)[ \t]*$";
const FIRST_NAME_LABELLED: &str = r"^[ \t]*First[ \t]*Name[ \t]*:[ \t]*(.+?)[ \t]*$";
const LAST_NAME_LABELLED: &str = r"^[ \t]*(?:Last|Sur)[ \t]*Name[ \t]*:[ \t]*(.+?)[ \t]*$";
const PHONE_LABELLED: &str =
    r"^[ \t]*(?:Contact[ \t]+)?(?:Tel|Telephone|Phone)(?:[ \t]+Number)?[ \t]*:[ \t]*(.+?)[ \t]*$";
const MOBILE_LABELLED: &str =
    r"^[ \t]*(?:Mobile|Cell)(?:[ \t]+(?:Phone|Number))?[ \t]*:[ \t]*(.+?)[ \t]*$";

pub const RIGHTBIZ: SourceSpec = SourceSpec {
    source: LeadSource::Rightbiz,
    parser: "rightbiz",
    indicators: &[
        IndicatorSpec::SenderDomain("rightbiz.co.uk"),
        IndicatorSpec::Subject(r"New Enquiry for[ \t]+[A-Z0-9]+"),
        IndicatorSpec::Subject(r"rightbiz"),
        IndicatorSpec::Body(r"rightbiz\.co\.uk"),
        IndicatorSpec::Body(r"^[ \t]*Ref:[ \t]*[A-Z0-9]+"),
        IndicatorSpec::Body(r"Rightbiz Team"),
    ],
    markers: &[
        r"@rightbiz\.co\.uk",
        r"rightbiz",
        r"New Enquiry for[ \t]+[A-Z0-9]+",
        r"^[ \t]*Ref:[ \t]*[A-Z0-9]+",
    ],
    fields: FieldPatterns {
        reference: &[
            r"^[ \t]*Ref:[ \t]*([A-Z0-9]+)",
            r"^[ \t]*Reference:[ \t]*([A-Z0-9]+)",
            r"New Enquiry for[ \t]+([A-Z0-9]+)",
            r"\b(RB\d+)\b",
        ],
        full_name: &[NAME_LABELLED, r"^Subject:.*\bfrom[ \t]+(.+?)[ \t]*$"],
        first_name: &[],
        last_name: &[],
        email: &[EMAIL_LABELLED],
        telephone: &[
            r"^[ \t]*Telephone(?:[ \t]+Number)?[ \t]*:[ \t]*(.+?)[ \t]*$",
            r"Telephone Number:[ \t]*(.+?)[ \t]*$",
            r"^[ \t]*Phone[ \t]*:[ \t]*(.+?)[ \t]*$",
        ],
        mobile: &[MOBILE_LABELLED],
        custom: &[],
    },
};

pub const DALTONS: SourceSpec = SourceSpec {
    source: LeadSource::Daltons,
    parser: "daltons",
    indicators: &[
        IndicatorSpec::SenderDomain("daltonssupportmail.com"),
        IndicatorSpec::Subject(r"Daltons[ \t]*Business"),
        IndicatorSpec::Subject(r"Business Ref\.:"),
        IndicatorSpec::Body(r"More Details are required for business with reference:"),
        IndicatorSpec::Body(r"Contact details:-[ \t]*Name[ \t]*:"),
        IndicatorSpec::Body(r"daltonssupportmail\.com"),
    ],
    markers: &[
        r"Daltons[ \t]*Business",
        r"Contact details:-[ \t]*Name[ \t]*:",
        r"More Details are required for business with reference:",
        r"@daltonssupportmail\.com",
    ],
    fields: FieldPatterns {
        reference: &[
            r"More Details are required for business with reference:[ \t]*([A-Z0-9]+)",
            r"Business Ref\.:[ \t]*([A-Z0-9]+)",
            r"\b(DAL\d+)\b",
            r"reference:[ \t]*([A-Z0-9]+)",
        ],
        full_name: &[
            r"Contact details:-[ \t]*Name[ \t]*:[ \t]*(.+?)[ \t]*$",
            NAME_LABELLED,
        ],
        first_name: &[],
        last_name: &[],
        email: &[
            r"^[ \t]*Email Address[ \t]*:[ \t]*<?([^\s<>]+@[^\s<>]+)",
            EMAIL_LABELLED,
        ],
        telephone: &[
            r"^[ \t]*Contact Phone[ \t]*:[ \t]*(.+?)[ \t]*$",
            r"^[ \t]*(?:Tele)?phone[ \t]*:[ \t]*(.+?)[ \t]*$",
        ],
        mobile: &[MOBILE_LABELLED],
        custom: &[],
    },
};

pub const HOMECARE: SourceSpec = SourceSpec {
    source: LeadSource::Homecare,
    parser: "homecare",
    indicators: &[
        IndicatorSpec::SenderDomain("homecare.co.uk"),
        IndicatorSpec::Subject(r"homecare"),
        IndicatorSpec::Body(r"homecare\.co\.uk"),
        IndicatorSpec::Body(r"^[ \t]*Your Reference:[ \t]*[A-Z0-9]+"),
    ],
    markers: &[
        r"homecare\.co\.uk",
        r"Your Reference:",
        r"^[ \t]*First Name:",
        r"^[ \t]*Last Name:",
    ],
    fields: FieldPatterns {
        reference: &[r"^[ \t]*Your Reference:[ \t]*([A-Z0-9]+)"],
        full_name: &[],
        first_name: &[FIRST_NAME_LABELLED],
        last_name: &[LAST_NAME_LABELLED],
        email: &[
            r"^[ \t]*Email Address[ \t]*:[ \t]*<?([^\s<>]+@[^\s<>]+)",
            EMAIL_LABELLED,
        ],
        telephone: &[
            r"^[ \t]*Telephone Number[ \t]*:[ \t]*(.+?)[ \t]*$",
            PHONE_LABELLED,
        ],
        mobile: &[MOBILE_LABELLED],
        custom: &[],
    },
};

pub const BUSINESSES_FOR_SALE: SourceSpec = SourceSpec {
    source: LeadSource::BusinessesForSale,
    parser: "b4s",
    indicators: &[
        IndicatorSpec::SenderDomain("businessesforsale.com"),
        IndicatorSpec::Subject(r"interested in your listing"),
        IndicatorSpec::Subject(r"\bBFS\d+"),
        IndicatorSpec::Body(r"BusinessesForSale\.com"),
        IndicatorSpec::Body(r"Your listing ref:"),
        IndicatorSpec::Body(r"has received the following message"),
        IndicatorSpec::Body(r"Reply directly to this email"),
    ],
    markers: &[
        r"BusinessesForSale\.com",
        r"Your listing ref:",
        r"interested in your listing",
        r"Reply directly to this email",
    ],
    fields: FieldPatterns {
        reference: &[
            r"Your listing ref:[ \t]*([A-Z0-9]+)",
            r"listing[ \t]+ref:[ \t]*([A-Z0-9]+)",
            r"^[ \t]*Your Reference:[ \t]*([A-Z0-9]+)",
            r"\b(BFS\d+)\b",
        ],
        full_name: &[
            NAME_LABELLED,
            r"^[ \t]*(?:Contact|Full)[ \t]+Name[ \t]*:[ \t]*(.+?)[ \t]*$",
        ],
        first_name: &[],
        last_name: &[],
        email: &[EMAIL_LABELLED],
        telephone: &[
            r"^[ \t]*Tel[ \t]*:[ \t]*(.+?)[ \t]*$",
            r"^[ \t]*(?:Telephone|Phone)(?:[ \t]+Number)?[ \t]*:[ \t]*(.+?)[ \t]*$",
        ],
        mobile: &[MOBILE_LABELLED],
        custom: &[(
            "listing_title",
            r"Your listing ref:[ \t]*[A-Z0-9]+[ \t]+(.+?)[ \t]*$",
        )],
    },
};

pub const NDA: SourceSpec = SourceSpec {
    source: LeadSource::Nda,
    parser: "nda",
    indicators: &[
        IndicatorSpec::Subject(r"NDA[ \t]+Submission"),
        IndicatorSpec::Body(r"NDA[ \t]+Submission"),
        IndicatorSpec::Body(r"confidentiality agreement"),
    ],
    markers: &[r"NDA[ \t]+Submission", r"confidentiality agreement"],
    fields: FieldPatterns {
        reference: &[r"^[ \t]*(?:Business[ \t]+)?Ref(?:erence)?[ \t]*:[ \t]*([A-Z0-9]+)"],
        full_name: &[NAME_LABELLED],
        first_name: &[FIRST_NAME_LABELLED],
        last_name: &[LAST_NAME_LABELLED],
        email: &[EMAIL_LABELLED, r"E-?mail[ \t]*:[ \t]*<?([^\s<>]+@[^\s<>]+)"],
        telephone: &[PHONE_LABELLED],
        mobile: &[MOBILE_LABELLED],
        custom: &[],
    },
};

pub const REGISTER_INTEREST: SourceSpec = SourceSpec {
    source: LeadSource::RegisterInterest,
    parser: "registerinterest",
    indicators: &[
        IndicatorSpec::Subject(r"register.*interest"),
        IndicatorSpec::Subject(r"mailing list"),
        IndicatorSpec::Body(r"Register my interest"),
        IndicatorSpec::Body(r"mailing list subscription"),
    ],
    markers: &[r"Register my interest", r"mailing list"],
    fields: FieldPatterns {
        reference: &[r"^[ \t]*Ref(?:erence)?[ \t]*:[ \t]*([A-Z0-9]+)"],
        full_name: &[NAME_LABELLED],
        first_name: &[FIRST_NAME_LABELLED],
        last_name: &[LAST_NAME_LABELLED],
        email: &[EMAIL_LABELLED],
        telephone: &[PHONE_LABELLED],
        mobile: &[MOBILE_LABELLED],
        custom: &[],
    },
};

/// Built-in sources, in detection order
pub const CATALOGUE: &[SourceSpec] = &[
    RIGHTBIZ,
    DALTONS,
    HOMECARE,
    BUSINESSES_FOR_SALE,
    NDA,
    REGISTER_INTEREST,
];

/// Source-agnostic line-prefix rules used by the fallback parser
pub const GENERIC: FieldPatterns = FieldPatterns {
    reference: &[
        r"^[ \t]*(?:Your[ \t]+)?(?:listing[ \t]+)?Ref(?:erence)?\.?[ \t]*:[ \t]*([A-Z0-9][A-Z0-9-]{2,})",
    ],
    full_name: &[
        r"^[ \t]*(?:Full[ \t]+|Contact[ \t]+|Your[ \t]+)?Name[ \t]*:[ \t]*(.+?)[ \t]*$",
    ],
    first_name: &[FIRST_NAME_LABELLED],
    last_name: &[LAST_NAME_LABELLED],
    email: &[EMAIL_LABELLED],
    telephone: &[PHONE_LABELLED],
    mobile: &[MOBILE_LABELLED],
    custom: &[],
};

/// Bare address scan used when no labelled email line exists
pub const BARE_EMAIL: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
