use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fields requested for every page of a remote slice.
pub const PAGE_FIELDS: &[&str] = &[
    "id",
    "number",
    "metatags.favorite",
    "metatags.inbox",
    "metatags.trash",
    "path",
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub u64);

/// Server-side rendition sizes for page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ImageSize {
    Original,
    Big,
    Medium,
    Small,
    X2400,
    X1600,
    X1280,
    X960,
    X768,
}

impl ImageSize {
    pub fn code(self) -> u8 {
        match self {
            Self::Original => 1,
            Self::Big => 2,
            Self::Medium => 3,
            Self::Small => 4,
            Self::X2400 => 10,
            Self::X1600 => 11,
            Self::X1280 => 12,
            Self::X960 => 13,
            Self::X768 => 14,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let size = match code {
            1 => Self::Original,
            2 => Self::Big,
            3 => Self::Medium,
            4 => Self::Small,
            10 => Self::X2400,
            11 => Self::X1600,
            12 => Self::X1280,
            13 => Self::X960,
            14 => Self::X768,
            _ => return None,
        };
        Some(size)
    }

    /// Picks the smallest rendition that still covers a viewport of the given width.
    pub fn optimal_for_width(viewport_width_px: u32) -> Self {
        match viewport_width_px {
            w if w > 2400 => Self::Original,
            w if w > 1600 => Self::X2400,
            w if w > 1280 => Self::X1600,
            w if w > 980 => Self::X1280,
            w if w > 768 => Self::X960,
            _ => Self::X768,
        }
    }
}

impl From<ImageSize> for u8 {
    fn from(size: ImageSize) -> Self {
        size.code()
    }
}

impl TryFrom<u8> for ImageSize {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown image size code {code}"))
    }
}

/// Image scaling preference. `Auto` resolves against the viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Scaling {
    #[default]
    Auto,
    Fixed(ImageSize),
}

impl Scaling {
    pub fn resolve(self, viewport_width_px: u32) -> ImageSize {
        match self {
            Self::Auto => ImageSize::optimal_for_width(viewport_width_px),
            Self::Fixed(size) => size,
        }
    }
}

impl From<Scaling> for u8 {
    fn from(scaling: Scaling) -> Self {
        match scaling {
            Scaling::Auto => 0,
            Scaling::Fixed(size) => size.code(),
        }
    }
}

impl TryFrom<u8> for Scaling {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        if code == 0 {
            return Ok(Self::Auto);
        }
        ImageSize::try_from(code).map(Self::Fixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFit {
    Height,
    Width,
    Contain,
    #[default]
    Auto,
}

impl FromStr for ItemFit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "height" => Ok(Self::Height),
            "width" => Ok(Self::Width),
            "contain" => Ok(Self::Contain),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown fit `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingDirection {
    #[default]
    TopToBottom,
    LeftToRight,
}

impl FromStr for ReadingDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "top_to_bottom" => Ok(Self::TopToBottom),
            "left_to_right" => Ok(Self::LeftToRight),
            other => Err(format!("unknown direction `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Gallery,
    Page,
}

/// Fetched image payload for a page. Opaque to the windowing logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProfile {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetaTags {
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub inbox: bool,
    #[serde(default)]
    pub trash: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ImageProfile>,
    #[serde(default)]
    pub metatags: MetaTags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Page {
    pub fn new(id: PageId, number: u32) -> Self {
        Self { id, number, profile: None, metatags: MetaTags::default(), path: None }
    }

    pub fn has_profile(&self) -> bool {
        self.profile.is_some()
    }
}

/// A contiguous run of pages returned by the server plus the collection total.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageSlice {
    pub items: Vec<Page>,
    pub count: u32,
}

impl PageSlice {
    pub fn new(items: Vec<Page>, count: u32) -> Self {
        Self { items, count }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position_of_number(&self, number: u32) -> Option<usize> {
        self.items.iter().position(|page| page.number == number)
    }

    pub fn position_of_id(&self, id: PageId) -> Option<usize> {
        self.items.iter().position(|page| page.id == id)
    }

    /// True when numbers ascend by exactly one across the slice.
    pub fn is_contiguous(&self) -> bool {
        self.items.windows(2).all(|pair| pair[1].number == pair[0].number + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub collection_id: CollectionId,
    pub number: u32,
    pub window_size: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOptions {
    pub size: ImageSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileQuery {
    pub item_type: ItemType,
    pub item_ids: Vec<PageId>,
    pub profile_options: ProfileOptions,
}

/// Profiles keyed by page id. A missing id means "not returned".
pub type ProfileResponse = BTreeMap<PageId, ImageProfile>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReadEvent {
    pub item_id: PageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderPreferences {
    pub fit: ItemFit,
    pub scaling: Scaling,
    pub auto_navigate_interval: u32,
    pub auto_read_next_countdown: u32,
    pub auto_navigate: bool,
    pub stretch_fit: bool,
    pub wheel_zoom: bool,
    pub direction: ReadingDirection,
}

impl Default for ReaderPreferences {
    fn default() -> Self {
        Self {
            fit: ItemFit::Auto,
            scaling: Scaling::Auto,
            auto_navigate_interval: 20,
            auto_read_next_countdown: 15,
            auto_navigate: false,
            stretch_fit: false,
            wheel_zoom: false,
            direction: ReadingDirection::TopToBottom,
        }
    }
}

/// Storage keys for each persisted reader preference.
pub mod keys {
    pub const FIT: &str = "reader_fit";
    pub const SCALING: &str = "reader_scaling";
    pub const NAVIGATE_INTERVAL: &str = "reader_navigate_interval";
    pub const READ_NEXT_COUNTDOWN: &str = "reader_read_next_countdown";
    pub const AUTO_NAVIGATE: &str = "reader_autonavigate";
    pub const STRETCH_FIT: &str = "reader_stretch_fit";
    pub const WHEEL_ZOOM: &str = "reader_zoom";
    pub const DIRECTION: &str = "reader_direction";

    pub const ALL: &[&str] = &[
        FIT,
        SCALING,
        NAVIGATE_INTERVAL,
        READ_NEXT_COUNTDOWN,
        AUTO_NAVIGATE,
        STRETCH_FIT,
        WHEEL_ZOOM,
        DIRECTION,
    ];
}
