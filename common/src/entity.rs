//! The catalogue of syncable entities.
//!
//! Each entity is a declarative [`EntitySpec`]: where its items live in the
//! source response, which fields make up the stored payload, how an existing
//! record is found, which fields this sync owns, and whether absent records
//! may be created. One generic pipeline in [`crate::reconcile`] runs them all.

use crate::config::Collection;
use crate::relation::Relation;
use clap::ValueEnum;
use std::fmt;

/// Every sync this tool can run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum EntityKind {
    Provinces,
    Parties,
    Areas,
    Candidates,
    CandidateScores,
    Partylist,
    PartylistResults,
    Referendum,
    National,
    ProvinceStats,
}

impl EntityKind {
    /// All entities, ordered so that referenced collections sync first.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Provinces,
        EntityKind::Parties,
        EntityKind::Areas,
        EntityKind::Candidates,
        EntityKind::CandidateScores,
        EntityKind::Partylist,
        EntityKind::PartylistResults,
        EntityKind::Referendum,
        EntityKind::National,
        EntityKind::ProvinceStats,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Provinces => "provinces",
            EntityKind::Parties => "parties",
            EntityKind::Areas => "areas",
            EntityKind::Candidates => "candidates",
            EntityKind::CandidateScores => "candidate-scores",
            EntityKind::Partylist => "partylist",
            EntityKind::PartylistResults => "partylist-results",
            EntityKind::Referendum => "referendum",
            EntityKind::National => "national",
            EntityKind::ProvinceStats => "province-stats",
        }
    }

    #[must_use]
    pub fn spec(self) -> &'static EntitySpec {
        match self {
            EntityKind::Provinces => &PROVINCES,
            EntityKind::Parties => &PARTIES,
            EntityKind::Areas => &AREAS,
            EntityKind::Candidates => &CANDIDATES,
            EntityKind::CandidateScores => &CANDIDATE_SCORES,
            EntityKind::Partylist => &PARTYLIST,
            EntityKind::PartylistResults => &PARTYLIST_RESULTS,
            EntityKind::Referendum => &REFERENDUM,
            EntityKind::National => &NATIONAL,
            EntityKind::ProvinceStats => &PROVINCE_STATS,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One component of a relation's natural key, read from a source item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// The value at a dotted source path.
    Path(&'static str),
    /// The value at a dotted source path, first resolved to a store id.
    Resolved(Relation, &'static str),
}

/// Where a payload field's value comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldSource {
    Path(&'static str),
    Relation {
        relation: Relation,
        key: &'static [KeyPart],
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source: FieldSource,
}

const fn field(name: &'static str, path: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        source: FieldSource::Path(path),
    }
}

const fn relation(name: &'static str, relation: Relation, key: &'static [KeyPart]) -> FieldSpec {
    FieldSpec {
        name,
        source: FieldSource::Relation { relation, key },
    }
}

/// How to find the stored counterpart of a source item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Equality filter on these payload fields.
    NaturalKey(&'static [&'static str]),
    /// The collection holds one rolling record; take whichever comes first.
    Singleton,
}

/// Which payload fields this sync is responsible for keeping current.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Owned {
    All,
    Only(&'static [&'static str]),
}

#[derive(Debug)]
pub struct EntitySpec {
    pub kind: EntityKind,
    /// Name of the array under `data` in the source response.
    pub source_field: &'static str,
    pub collection: Collection,
    pub paginated: bool,
    /// The payload allow-list. Nothing else from the source is written.
    pub fields: &'static [FieldSpec],
    pub lookup: Lookup,
    pub owned: Owned,
    /// When false, items without a stored record are skipped.
    pub create: bool,
    /// Source paths joined to identify an item in log lines.
    pub label: &'static [&'static str],
}

impl EntitySpec {
    /// Names of the owned payload fields, in allow-list order.
    pub fn owned_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .map(|f| f.name)
            .filter(move |name| match self.owned {
                Owned::All => true,
                Owned::Only(owned) => owned.contains(name),
            })
    }

    /// Whether the payload field `name` holds a resolved relation id.
    #[must_use]
    pub fn is_relation(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.name == name && matches!(f.source, FieldSource::Relation { .. }))
    }
}

const PROVINCE_BY_NAME: &[KeyPart] = &[KeyPart::Path("provinceName")];
const PARTY_BY_NAME: &[KeyPart] = &[KeyPart::Path("partyName")];
const AREA_BY_PROVINCE_AND_NUMBER: &[KeyPart] = &[
    KeyPart::Resolved(Relation::Province, "provinceName"),
    KeyPart::Path("areaNumber"),
];

static PROVINCES: EntitySpec = EntitySpec {
    kind: EntityKind::Provinces,
    source_field: "provinces",
    collection: Collection::Provinces,
    paginated: false,
    fields: &[
        field("name", "name"),
        field("code", "code"),
        field("region", "region"),
        field("totalAreas", "totalAreas"),
        field("eligibleVoters", "eligibleVoters"),
    ],
    lookup: Lookup::NaturalKey(&["name"]),
    owned: Owned::All,
    create: true,
    label: &["name"],
};

static PARTIES: EntitySpec = EntitySpec {
    kind: EntityKind::Parties,
    source_field: "parties",
    collection: Collection::Parties,
    paginated: false,
    fields: &[
        field("name", "name"),
        field("code", "code"),
        field("color", "color"),
        field("logoUrl", "logoUrl"),
        field("totalCandidates", "totalCandidates"),
    ],
    lookup: Lookup::NaturalKey(&["name"]),
    owned: Owned::All,
    create: true,
    label: &["name"],
};

static AREAS: EntitySpec = EntitySpec {
    kind: EntityKind::Areas,
    source_field: "electionAreas",
    collection: Collection::Areas,
    paginated: false,
    fields: &[
        relation("province", Relation::Province, PROVINCE_BY_NAME),
        field("areaNumber", "areaNumber"),
        field("name", "name"),
        field("eligibleVoters", "eligibleVoters"),
        field("totalStations", "totalStations"),
    ],
    lookup: Lookup::NaturalKey(&["province", "areaNumber"]),
    owned: Owned::All,
    create: true,
    label: &["provinceName", "areaNumber"],
};

static CANDIDATES: EntitySpec = EntitySpec {
    kind: EntityKind::Candidates,
    source_field: "candidates",
    collection: Collection::Candidates,
    paginated: true,
    fields: &[
        relation("area", Relation::Area, AREA_BY_PROVINCE_AND_NUMBER),
        field("number", "number"),
        field("title", "title"),
        field("firstName", "firstName"),
        field("lastName", "lastName"),
        relation("party", Relation::Party, PARTY_BY_NAME),
        field("imageUrl", "imageUrl"),
    ],
    lookup: Lookup::NaturalKey(&["area", "number"]),
    owned: Owned::All,
    create: true,
    label: &["provinceName", "areaNumber", "number"],
};

static CANDIDATE_SCORES: EntitySpec = EntitySpec {
    kind: EntityKind::CandidateScores,
    source_field: "candidates",
    collection: Collection::Candidates,
    paginated: true,
    fields: &[
        relation("area", Relation::Area, AREA_BY_PROVINCE_AND_NUMBER),
        field("number", "number"),
        field("totalVotes", "totalVotes"),
        field("votePercent", "votePercent"),
        field("rank", "rank"),
    ],
    lookup: Lookup::NaturalKey(&["area", "number"]),
    owned: Owned::Only(&["totalVotes", "votePercent", "rank"]),
    create: false,
    label: &["provinceName", "areaNumber", "number"],
};

static PARTYLIST: EntitySpec = EntitySpec {
    kind: EntityKind::Partylist,
    source_field: "partyLists",
    collection: Collection::Partylist,
    paginated: false,
    fields: &[
        relation("party", Relation::Party, PARTY_BY_NAME),
        field("number", "listNumber"),
        field("title", "title"),
        field("firstName", "firstName"),
        field("lastName", "lastName"),
        field("imageUrl", "imageUrl"),
    ],
    lookup: Lookup::NaturalKey(&["party", "number"]),
    owned: Owned::All,
    create: true,
    label: &["partyName", "listNumber"],
};

static PARTYLIST_RESULTS: EntitySpec = EntitySpec {
    kind: EntityKind::PartylistResults,
    source_field: "partyListResults",
    collection: Collection::PartylistResults,
    paginated: false,
    fields: &[
        relation("party", Relation::Party, PARTY_BY_NAME),
        field("totalVotes", "totalVotes"),
        field("votePercent", "votePercent"),
        field("seats", "seats"),
    ],
    lookup: Lookup::NaturalKey(&["party"]),
    owned: Owned::All,
    create: true,
    label: &["partyName"],
};

static REFERENDUM: EntitySpec = EntitySpec {
    kind: EntityKind::Referendum,
    source_field: "questions",
    collection: Collection::Referendum,
    paginated: false,
    fields: &[
        field("questionNumber", "number"),
        field("title", "title"),
        field("agreeVotes", "results.agree"),
        field("disagreeVotes", "results.disagree"),
        field("abstainVotes", "results.abstain"),
        field("badBallots", "results.badBallots"),
    ],
    lookup: Lookup::NaturalKey(&["questionNumber"]),
    owned: Owned::All,
    create: true,
    label: &["number"],
};

static NATIONAL: EntitySpec = EntitySpec {
    kind: EntityKind::National,
    source_field: "national",
    collection: Collection::National,
    paginated: false,
    fields: &[
        field("eligibleVoters", "eligibleVoters"),
        field("totalVotes", "totalVotes"),
        field("turnoutPercent", "turnoutPercent"),
        field("countedStations", "countedStations"),
        field("totalStations", "totalStations"),
        field("countedPercent", "countedPercent"),
        field("badBallots", "badBallots"),
        field("noVotes", "noVotes"),
    ],
    lookup: Lookup::Singleton,
    owned: Owned::All,
    create: true,
    label: &[],
};

static PROVINCE_STATS: EntitySpec = EntitySpec {
    kind: EntityKind::ProvinceStats,
    source_field: "provinces",
    collection: Collection::Provinces,
    paginated: false,
    fields: &[
        field("name", "name"),
        field("totalVotes", "totalVotes"),
        field("turnoutPercent", "turnoutPercent"),
        field("countedStations", "countedStations"),
        field("countedPercent", "countedPercent"),
        field("badBallots", "badBallots"),
        field("noVotes", "noVotes"),
    ],
    lookup: Lookup::NaturalKey(&["name"]),
    owned: Owned::Only(&[
        "totalVotes",
        "turnoutPercent",
        "countedStations",
        "countedPercent",
        "badBallots",
        "noVotes",
    ]),
    create: false,
    label: &["name"],
};
