//! Interned PDF names.
//!
//! Names that appear in almost every document (dictionary keys such as
//! `/Type` or `/Parent`, common values such as `/Page`) are assigned a small
//! integer identity by a precomputed [`NameTable`]. Comparing two well-known
//! names is an integer comparison; any other name carries its own bytes.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

macro_rules! well_known_names {
    ($($konst:ident => $text:literal,)*) => {
        /// Texts of the well-known names, indexed by identity.
        const WELL_KNOWN: &[&str] = &[$($text,)*];

        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[repr(u16)]
        enum Slot {
            $($konst,)*
        }

        /// Well-known names as constants.
        pub mod names {
            use super::{Name, Repr, Slot};

            $(
                #[doc = concat!("`/", $text, "`")]
                pub const $konst: Name = Name(Repr::Known(Slot::$konst as u16));
            )*
        }
    };
}

well_known_names! {
    A => "A",
    AA => "AA",
    ACRO_FORM => "AcroForm",
    ANNOT => "Annot",
    ANNOTS => "Annots",
    AP => "AP",
    AS => "AS",
    ASCII85_DECODE => "ASCII85Decode",
    ASCII_HEX_DECODE => "ASCIIHexDecode",
    AUTHOR => "Author",
    BBOX => "BBox",
    BITS_PER_COMPONENT => "BitsPerComponent",
    BLEED_BOX => "BleedBox",
    BM => "BM",
    BORDER => "Border",
    BPC => "BPC",
    C => "C",
    CATALOG => "Catalog",
    COLOR_SPACE => "ColorSpace",
    COLORS => "Colors",
    COLUMNS => "Columns",
    CONTENTS => "Contents",
    COUNT => "Count",
    CREATION_DATE => "CreationDate",
    CREATOR => "Creator",
    CROP_BOX => "CropBox",
    CS => "CS",
    D => "D",
    DA => "DA",
    DCT_DECODE => "DCTDecode",
    DECODE => "Decode",
    DECODE_PARMS => "DecodeParms",
    DEST => "Dest",
    DESTS => "Dests",
    DEVICE_CMYK => "DeviceCMYK",
    DEVICE_GRAY => "DeviceGray",
    DEVICE_RGB => "DeviceRGB",
    DL => "DL",
    DP => "DP",
    DR => "DR",
    ENCRYPT => "Encrypt",
    EXT_G_STATE => "ExtGState",
    F => "F",
    FF => "Ff",
    FIELDS => "Fields",
    FILTER => "Filter",
    FIRST => "First",
    FLATE_DECODE => "FlateDecode",
    FONT => "Font",
    FORM => "Form",
    FT => "FT",
    GROUP => "Group",
    H => "H",
    HEIGHT => "Height",
    I => "I",
    ID => "ID",
    IM => "IM",
    IMAGE => "Image",
    IMAGE_MASK => "ImageMask",
    INDEX => "Index",
    INFO => "Info",
    INTERPOLATE => "Interpolate",
    K => "K",
    KEYWORDS => "Keywords",
    KIDS => "Kids",
    L => "L",
    LAST => "Last",
    LENGTH => "Length",
    LINK => "Link",
    LZW_DECODE => "LZWDecode",
    MATRIX => "Matrix",
    MEDIA_BOX => "MediaBox",
    METADATA => "Metadata",
    MOD_DATE => "ModDate",
    N => "N",
    NAME => "Name",
    NAMES => "Names",
    NEXT => "Next",
    NORMAL => "Normal",
    OBJ_STM => "ObjStm",
    OC => "OC",
    OPEN_ACTION => "OpenAction",
    OUTLINES => "Outlines",
    P => "P",
    PAGE => "Page",
    PAGES => "Pages",
    PARENT => "Parent",
    PATTERN => "Pattern",
    PREDICTOR => "Predictor",
    PREV => "Prev",
    PROC_SET => "ProcSet",
    PRODUCER => "Producer",
    PROPERTIES => "Properties",
    Q => "Q",
    RECT => "Rect",
    RESOURCES => "Resources",
    ROOT => "Root",
    ROTATE => "Rotate",
    RUN_LENGTH_DECODE => "RunLengthDecode",
    S => "S",
    SHADING => "Shading",
    SIZE => "Size",
    SMASK => "SMask",
    STRUCT_TREE_ROOT => "StructTreeRoot",
    SUBJECT => "Subject",
    SUBTYPE => "Subtype",
    T => "T",
    TEXT => "Text",
    THREADS => "Threads",
    TITLE => "Title",
    TRANSPARENCY => "Transparency",
    TRIM_BOX => "TrimBox",
    TYPE => "Type",
    U => "U",
    URI => "URI",
    USER_UNIT => "UserUnit",
    V => "V",
    W => "W",
    WIDGET => "Widget",
    WIDTH => "Width",
    X_OBJECT => "XObject",
    XREF => "XRef",
}

/// An interned PDF name, written `/Name` in document syntax.
///
/// Cloning is cheap. Two names are equal exactly when their bytes are equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(Repr);

// Other never holds the text of a well-known name, so derived equality
// agrees with byte equality.
#[derive(Clone, PartialEq, Eq, Hash)]
enum Repr {
    Known(u16),
    Other(Rc<[u8]>),
}

impl Name {
    /// Interns `text` in the standard table.
    pub fn new(text: &str) -> Name {
        NameTable::standard().intern(text.as_bytes())
    }

    /// Interns raw name bytes in the standard table.
    pub fn from_bytes(bytes: &[u8]) -> Name {
        NameTable::standard().intern(bytes)
    }

    /// Returns the bytes of the name, without the leading slash.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.0 {
            Repr::Known(slot) => WELL_KNOWN[*slot as usize].as_bytes(),
            Repr::Other(bytes) => bytes,
        }
    }

    /// Returns the name as text, replacing invalid UTF-8.
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Returns the small integer identity of a well-known name.
    pub fn id(&self) -> Option<u16> {
        match self.0 {
            Repr::Known(slot) => Some(slot),
            Repr::Other(_) => None,
        }
    }

    /// Returns true if this name is in the precomputed table.
    pub fn is_well_known(&self) -> bool {
        self.id().is_some()
    }

    /// Returns true if the name's bytes equal `text`.
    pub fn is(&self, text: &str) -> bool {
        self.as_bytes() == text.as_bytes()
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Repr::Known(a), Repr::Known(b)) if a == b => Ordering::Equal,
            _ => self.as_bytes().cmp(other.as_bytes()),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.to_str_lossy())
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}

/// Immutable lookup table from name bytes to well-known identities.
///
/// Built once per process; documents hold a `&'static` reference to the
/// table they intern through.
pub struct NameTable {
    lookup: FxHashMap<&'static [u8], u16>,
}

lazy_static! {
    static ref STANDARD: NameTable = NameTable::build();
}

impl NameTable {
    fn build() -> Self {
        let lookup = WELL_KNOWN
            .iter()
            .enumerate()
            .map(|(slot, text)| (text.as_bytes(), slot as u16))
            .collect();
        NameTable { lookup }
    }

    /// Returns the process-wide standard table.
    pub fn standard() -> &'static NameTable {
        &STANDARD
    }

    /// Interns `bytes`, returning the well-known identity when there is one.
    pub fn intern(&self, bytes: &[u8]) -> Name {
        match self.lookup.get(bytes) {
            Some(&slot) => Name(Repr::Known(slot)),
            None => Name(Repr::Other(Rc::from(bytes))),
        }
    }

    /// Returns the bytes of `name`.
    pub fn text<'a>(&self, name: &'a Name) -> &'a [u8] {
        name.as_bytes()
    }

    /// Returns the well-known name with identity `id`.
    pub fn get(&self, id: u16) -> Option<Name> {
        ((id as usize) < WELL_KNOWN.len()).then_some(Name(Repr::Known(id)))
    }

    /// Number of well-known names.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

impl fmt::Debug for NameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTable").field("len", &self.len()).finish()
    }
}
