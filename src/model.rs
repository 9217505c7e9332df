//! Canonical data model shared by every adapter.
//!
//! All adapters normalize into these types; the merge engine and the native
//! serializer only ever see this model. Values are stored in fixed integer
//! milli-units so that serialize/parse round-trips are bit-exact:
//!
//! - depth: millimetres
//! - pressure: millibar
//! - cylinder volume: millilitres
//! - gas fractions: permille (O2 defaults to air)
//! - temperature: millidegrees Celsius
//! - timestamps: epoch seconds UTC
//! - durations and sample offsets: seconds

use std::collections::BTreeMap;

/// O2 permille of atmospheric air, used as the default gas mix.
pub const O2_IN_AIR: i32 = 209;

/// A breathing-gas mix as O2/He permille fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMix {
    /// O2 fraction, permille.
    pub o2_permille: i32,
    /// He fraction, permille.
    pub he_permille: i32,
}

impl GasMix {
    /// Plain air (20.9% O2, no helium).
    pub const AIR: GasMix = GasMix {
        o2_permille: O2_IN_AIR,
        he_permille: 0,
    };

    /// True when this mix is plain air.
    pub fn is_air(&self) -> bool {
        *self == Self::AIR
    }
}

impl Default for GasMix {
    fn default() -> Self {
        Self::AIR
    }
}

/// One gas tank used during a dive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cylinder {
    /// Water volume in millilitres.
    pub size_ml: Option<i32>,
    /// Gas mix, air when unspecified by the source.
    pub gas: GasMix,
    /// Pressure at the start of the dive, millibar.
    pub start_mbar: Option<i32>,
    /// Pressure at the end of the dive, millibar.
    pub end_mbar: Option<i32>,
}

impl Cylinder {
    /// Merge equality: two cylinders are "the same" iff size and mix match.
    /// Pressure readings are deliberately excluded; on merge the more
    /// complete side's readings win.
    pub fn same_type(&self, other: &Cylinder) -> bool {
        self.size_ml == other.size_ml && self.gas == other.gas
    }
}

/// One time-stamped profile reading within a dive-computer record.
///
/// `time_s` offsets are monotonically non-decreasing within one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    /// Offset from the dive computer's start, seconds.
    pub time_s: i32,
    /// Depth, millimetres.
    pub depth_mm: i32,
    /// Water temperature, millidegrees Celsius.
    pub temperature_mc: Option<i32>,
    /// Cylinder pressure, millibar.
    pub pressure_mbar: Option<i32>,
    /// Index of the cylinder `pressure_mbar` belongs to.
    pub sensor: Option<usize>,
    /// CNS loading, permille.
    pub cns_permille: Option<i32>,
    /// No-decompression limit, seconds.
    pub ndl_s: Option<i32>,
    /// Time to surface, seconds.
    pub tts_s: Option<i32>,
    /// Deco stop depth, millimetres.
    pub stopdepth_mm: Option<i32>,
    /// CCR setpoint, millibar.
    pub setpoint_mbar: Option<i32>,
    /// Measured pO2, millibar.
    pub po2_mbar: Option<i32>,
    /// Individual O2 sensor readings, millibar.
    pub o2sensor_mbar: [Option<i32>; 3],
}

/// One device's account of a dive, holding its own sample stream.
///
/// A dive may aggregate several records from different devices; the merge
/// engine deduplicates them by device identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiveComputer {
    /// Device model/product label.
    pub model: Option<String>,
    /// Device serial number.
    pub serial: Option<String>,
    /// User-assigned nickname carried by some sources (e.g. DLD containers).
    pub nickname: Option<String>,
    /// The device's own start timestamp, epoch seconds UTC. May differ
    /// slightly from the dive's.
    pub when: i64,
    /// Materialized, re-readable sample sequence in time order.
    pub samples: Vec<Sample>,
}

impl DiveComputer {
    /// Device identity used for merge dedup.
    pub fn same_device(&self, other: &DiveComputer) -> bool {
        self.model == other.model && self.serial == other.serial
    }
}

/// Stable dive-site identifier.
///
/// Derived from the site name and GPS text with FNV-1a so the same site gets
/// the same identifier across runs. Sites are deduplicated by identifier
/// only, never by fuzzy name match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteId(pub u32);

impl SiteId {
    /// Derive the identifier for a site from its name and optional GPS pair.
    pub fn of(name: &str, gps: Option<(i32, i32)>) -> SiteId {
        let mut h: u32 = 0x811c9dc5;
        let mut eat = |bytes: &[u8]| {
            for &b in bytes {
                h ^= u32::from(b);
                h = h.wrapping_mul(0x0100_0193);
            }
        };
        eat(name.as_bytes());
        if let Some((lat, lon)) = gps {
            eat(&lat.to_le_bytes());
            eat(&lon.to_le_bytes());
        }
        SiteId(h)
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// A named/located place where dives occur, shared by reference across dives.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiveSite {
    /// Display name, possibly empty for a GPS-only site.
    pub name: String,
    /// Latitude/longitude in micro-degrees.
    pub gps: Option<(i32, i32)>,
}

/// Registry owning all [`DiveSite`]s of a session.
///
/// Dives reference sites weakly through [`SiteId`]; the registry is the only
/// owner. Keyed storage is ordered so serialization output is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteRegistry {
    sites: BTreeMap<SiteId, DiveSite>,
}

impl SiteRegistry {
    /// Look up a site by identifier.
    pub fn get(&self, id: SiteId) -> Option<&DiveSite> {
        self.sites.get(&id)
    }

    /// Look up a site by identifier, allocating a new empty one if absent.
    /// Idempotent: requesting the same identifier twice yields one site.
    pub fn get_or_create(&mut self, id: SiteId) -> &mut DiveSite {
        self.sites.entry(id).or_default()
    }

    /// Iterate sites in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (SiteId, &DiveSite)> {
        self.sites.iter().map(|(id, s)| (*id, s))
    }

    /// Number of registered sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// True when no sites are registered.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Drop all sites.
    pub fn clear(&mut self) {
        self.sites.clear();
    }
}

/// One logged underwater excursion, the primary entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dive {
    /// User-facing dive number. Not guaranteed unique before merge.
    pub number: Option<i32>,
    /// Start timestamp, epoch seconds UTC.
    pub when: i64,
    /// Duration, seconds.
    pub duration_s: i32,
    /// Weak reference into the session's [`SiteRegistry`].
    pub site: Option<SiteId>,
    /// Maximum depth, millimetres.
    pub max_depth_mm: Option<i32>,
    /// Mean depth, millimetres.
    pub mean_depth_mm: Option<i32>,
    /// Air temperature, millidegrees Celsius.
    pub air_temp_mc: Option<i32>,
    /// Water temperature, millidegrees Celsius.
    pub water_temp_mc: Option<i32>,
    pub buddy: Option<String>,
    pub divemaster: Option<String>,
    pub suit: Option<String>,
    pub notes: Option<String>,
    pub weight: Option<String>,
    pub tags: Option<String>,
    /// Cylinders in first-use order.
    pub cylinders: Vec<Cylinder>,
    /// Dive-computer records contributing to this dive.
    pub computers: Vec<DiveComputer>,
}

impl Dive {
    /// Serial of the first dive computer, if any. Together with `when` this
    /// forms the post-merge uniqueness key of the table.
    pub fn primary_serial(&self) -> Option<&str> {
        self.computers.first().and_then(|dc| dc.serial.as_deref())
    }
}

/// Ordered sequence of dives, sorted by start timestamp ascending.
///
/// Owns its dives exclusively. Invariant (after merge): no two dives share an
/// identical (start timestamp, primary DC serial) pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiveTable {
    dives: Vec<Dive>,
}

impl DiveTable {
    /// Number of dives in the table.
    pub fn nr(&self) -> usize {
        self.dives.len()
    }

    /// True when the table holds no dives.
    pub fn is_empty(&self) -> bool {
        self.dives.is_empty()
    }

    /// Insert a dive, keeping timestamp order. Dives with equal timestamps
    /// keep their insertion (file) order.
    pub fn push(&mut self, dive: Dive) {
        let pos = self.dives.partition_point(|d| d.when <= dive.when);
        self.dives.insert(pos, dive);
    }

    /// Iterate dives in timestamp order.
    pub fn iter(&self) -> std::slice::Iter<'_, Dive> {
        self.dives.iter()
    }

    /// Iterate dives mutably. Callers must not break timestamp order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Dive> {
        self.dives.iter_mut()
    }

    /// Access a dive by position.
    pub fn get(&self, idx: usize) -> Option<&Dive> {
        self.dives.get(idx)
    }

    /// Remove all dives.
    pub fn clear(&mut self) {
        self.dives.clear();
    }

    /// Take all dives out of the table, leaving it empty.
    pub fn take_all(&mut self) -> Vec<Dive> {
        std::mem::take(&mut self.dives)
    }
}

impl IntoIterator for DiveTable {
    type Item = Dive;
    type IntoIter = std::vec::IntoIter<Dive>;

    fn into_iter(self) -> Self::IntoIter {
        self.dives.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiveTable {
    type Item = &'a Dive;
    type IntoIter = std::slice::Iter<'a, Dive>;

    fn into_iter(self) -> Self::IntoIter {
        self.dives.iter()
    }
}

/// One import session: a dive table plus the site registry its dives
/// reference.
///
/// Every adapter takes an explicit `&mut DiveLog`; there is no ambient global
/// table. Callers that want isolated sessions must call [`DiveLog::clear`]
/// between them; the reset is complete (dives, sites, nicknames), nothing
/// leaks across the boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiveLog {
    pub table: DiveTable,
    pub sites: SiteRegistry,
}

impl DiveLog {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the session to empty. Required between independent imports that
    /// must not see each other's state.
    pub fn clear(&mut self) {
        self.table.clear();
        self.sites.clear();
    }

    /// Commit a staged session into this one: dives append in timestamp
    /// order and staged sites fill in whatever the registry does not
    /// already know.
    ///
    /// Adapters build into a private session and absorb it only once the
    /// whole scan has succeeded, so a failure mid-file leaves neither
    /// partial dives nor partial sites behind.
    pub fn absorb(&mut self, staged: DiveLog) {
        for (id, site) in staged.sites.iter() {
            let dest = self.sites.get_or_create(id);
            if dest.name.is_empty() {
                dest.name = site.name.clone();
            }
            if dest.gps.is_none() {
                dest.gps = site.gps;
            }
        }
        for dive in staged.table {
            self.table.push(dive);
        }
    }
}
