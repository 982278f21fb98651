//! ICAO 24-bit address allocation table.
//!
//! Mode S addresses are allocated to states in contiguous blocks. The table
//! below covers the allocated blocks; addresses outside any block resolve to
//! no country.

use crate::types::IcaoAddress;

/// Country registration resolved for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registration {
    /// Display name of the allocating state
    pub country: Option<&'static str>,
    /// ISO 3166-1 alpha-2 code, when the block belongs to a state
    pub code: Option<&'static str>,
}

/// One allocated address block (inclusive bounds).
#[derive(Debug, Clone, Copy)]
struct AllocationRange {
    start: u32,
    end: u32,
    country: &'static str,
    code: Option<&'static str>,
}

const fn range(
    start: u32,
    end: u32,
    country: &'static str,
    code: Option<&'static str>,
) -> AllocationRange {
    AllocationRange {
        start,
        end,
        country,
        code,
    }
}

/// Sorted by `start`, non-overlapping.
static ALLOCATIONS: &[AllocationRange] = &[
    range(0x000000, 0x003FFF, "Unassigned", None),
    range(0x004000, 0x0043FF, "Zimbabwe", Some("ZW")),
    range(0x006000, 0x006FFF, "Mozambique", Some("MZ")),
    range(0x008000, 0x00FFFF, "South Africa", Some("ZA")),
    range(0x010000, 0x017FFF, "Egypt", Some("EG")),
    range(0x018000, 0x01FFFF, "Libya", Some("LY")),
    range(0x020000, 0x027FFF, "Morocco", Some("MA")),
    range(0x028000, 0x02FFFF, "Tunisia", Some("TN")),
    range(0x030000, 0x0303FF, "Botswana", Some("BW")),
    range(0x032000, 0x032FFF, "Burundi", Some("BI")),
    range(0x034000, 0x034FFF, "Cameroon", Some("CM")),
    range(0x035000, 0x0353FF, "Comoros", Some("KM")),
    range(0x036000, 0x036FFF, "Congo", Some("CG")),
    range(0x038000, 0x038FFF, "Cote d'Ivoire", Some("CI")),
    range(0x03E000, 0x03EFFF, "Gabon", Some("GA")),
    range(0x040000, 0x040FFF, "Ethiopia", Some("ET")),
    range(0x042000, 0x042FFF, "Equatorial Guinea", Some("GQ")),
    range(0x044000, 0x044FFF, "Ghana", Some("GH")),
    range(0x046000, 0x046FFF, "Guinea", Some("GN")),
    range(0x048000, 0x0483FF, "Guinea-Bissau", Some("GW")),
    range(0x04A000, 0x04A3FF, "Lesotho", Some("LS")),
    range(0x04C000, 0x04CFFF, "Kenya", Some("KE")),
    range(0x050000, 0x050FFF, "Liberia", Some("LR")),
    range(0x054000, 0x054FFF, "Madagascar", Some("MG")),
    range(0x058000, 0x058FFF, "Malawi", Some("MW")),
    range(0x05A000, 0x05A3FF, "Maldives", Some("MV")),
    range(0x05C000, 0x05CFFF, "Mali", Some("ML")),
    range(0x05E000, 0x05E3FF, "Mauritania", Some("MR")),
    range(0x060000, 0x0603FF, "Mauritius", Some("MU")),
    range(0x062000, 0x062FFF, "Niger", Some("NE")),
    range(0x064000, 0x064FFF, "Nigeria", Some("NG")),
    range(0x068000, 0x068FFF, "Uganda", Some("UG")),
    range(0x06A000, 0x06A3FF, "Qatar", Some("QA")),
    range(0x06C000, 0x06CFFF, "Central African Republic", Some("CF")),
    range(0x06E000, 0x06EFFF, "Rwanda", Some("RW")),
    range(0x070000, 0x070FFF, "Senegal", Some("SN")),
    range(0x074000, 0x0743FF, "Seychelles", Some("SC")),
    range(0x076000, 0x0763FF, "Sierra Leone", Some("SL")),
    range(0x078000, 0x078FFF, "Somalia", Some("SO")),
    range(0x07A000, 0x07A3FF, "Eswatini", Some("SZ")),
    range(0x07C000, 0x07CFFF, "Sudan", Some("SD")),
    range(0x080000, 0x080FFF, "Tanzania", Some("TZ")),
    range(0x084000, 0x084FFF, "Chad", Some("TD")),
    range(0x088000, 0x088FFF, "Togo", Some("TG")),
    range(0x08A000, 0x08AFFF, "Zambia", Some("ZM")),
    range(0x08C000, 0x08CFFF, "Democratic Republic of the Congo", Some("CD")),
    range(0x090000, 0x090FFF, "Angola", Some("AO")),
    range(0x094000, 0x0943FF, "Benin", Some("BJ")),
    range(0x096000, 0x0963FF, "Cape Verde", Some("CV")),
    range(0x098000, 0x0983FF, "Djibouti", Some("DJ")),
    range(0x09A000, 0x09AFFF, "The Gambia", Some("GM")),
    range(0x09C000, 0x09CFFF, "Burkina Faso", Some("BF")),
    range(0x09E000, 0x09E3FF, "Sao Tome and Principe", Some("ST")),
    range(0x0A0000, 0x0A7FFF, "Algeria", Some("DZ")),
    range(0x0A8000, 0x0A8FFF, "Bahamas", Some("BS")),
    range(0x0AA000, 0x0AA3FF, "Barbados", Some("BB")),
    range(0x0AB000, 0x0AB3FF, "Belize", Some("BZ")),
    range(0x0AC000, 0x0ACFFF, "Colombia", Some("CO")),
    range(0x0AE000, 0x0AEFFF, "Costa Rica", Some("CR")),
    range(0x0B0000, 0x0B0FFF, "Cuba", Some("CU")),
    range(0x0B2000, 0x0B2FFF, "El Salvador", Some("SV")),
    range(0x0B4000, 0x0B4FFF, "Guatemala", Some("GT")),
    range(0x0B6000, 0x0B6FFF, "Guyana", Some("GY")),
    range(0x0B8000, 0x0B8FFF, "Haiti", Some("HT")),
    range(0x0BA000, 0x0BAFFF, "Honduras", Some("HN")),
    range(0x0BC000, 0x0BC3FF, "Saint Vincent and the Grenadines", Some("VC")),
    range(0x0BE000, 0x0BEFFF, "Jamaica", Some("JM")),
    range(0x0C0000, 0x0C0FFF, "Nicaragua", Some("NI")),
    range(0x0C2000, 0x0C2FFF, "Panama", Some("PA")),
    range(0x0C4000, 0x0C4FFF, "Dominican Republic", Some("DO")),
    range(0x0C6000, 0x0C6FFF, "Trinidad and Tobago", Some("TT")),
    range(0x0C8000, 0x0C8FFF, "Suriname", Some("SR")),
    range(0x0CA000, 0x0CA3FF, "Antigua and Barbuda", Some("AG")),
    range(0x0CC000, 0x0CC3FF, "Grenada", Some("GD")),
    range(0x0D0000, 0x0D7FFF, "Mexico", Some("MX")),
    range(0x0D8000, 0x0DFFFF, "Venezuela", Some("VE")),
    range(0x100000, 0x1FFFFF, "Russian Federation", Some("RU")),
    range(0x300000, 0x33FFFF, "Italy", Some("IT")),
    range(0x340000, 0x37FFFF, "Spain", Some("ES")),
    range(0x380000, 0x3BFFFF, "France", Some("FR")),
    range(0x3C0000, 0x3FFFFF, "Germany", Some("DE")),
    range(0x400000, 0x43FFFF, "United Kingdom", Some("GB")),
    range(0x440000, 0x447FFF, "Austria", Some("AT")),
    range(0x448000, 0x44FFFF, "Belgium", Some("BE")),
    range(0x450000, 0x457FFF, "Bulgaria", Some("BG")),
    range(0x458000, 0x45FFFF, "Denmark", Some("DK")),
    range(0x460000, 0x467FFF, "Finland", Some("FI")),
    range(0x468000, 0x46FFFF, "Greece", Some("GR")),
    range(0x470000, 0x477FFF, "Hungary", Some("HU")),
    range(0x478000, 0x47FFFF, "Norway", Some("NO")),
    range(0x480000, 0x487FFF, "Netherlands", Some("NL")),
    range(0x488000, 0x48FFFF, "Poland", Some("PL")),
    range(0x490000, 0x497FFF, "Portugal", Some("PT")),
    range(0x498000, 0x49FFFF, "Czech Republic", Some("CZ")),
    range(0x4A0000, 0x4A7FFF, "Romania", Some("RO")),
    range(0x4A8000, 0x4AFFFF, "Sweden", Some("SE")),
    range(0x4B0000, 0x4B7FFF, "Switzerland", Some("CH")),
    range(0x4B8000, 0x4BFFFF, "Türkiye", Some("TR")),
    range(0x4C8000, 0x4C83FF, "Cyprus", Some("CY")),
    range(0x4CA000, 0x4CAFFF, "Ireland", Some("IE")),
    range(0x4CC000, 0x4CCFFF, "Iceland", Some("IS")),
    range(0x4D0000, 0x4D03FF, "Luxembourg", Some("LU")),
    range(0x4D2000, 0x4D23FF, "Malta", Some("MT")),
    range(0x4D4000, 0x4D43FF, "Monaco", Some("MC")),
    range(0x500000, 0x5003FF, "San Marino", Some("SM")),
    range(0x501000, 0x5013FF, "Albania", Some("AL")),
    range(0x501C00, 0x501FFF, "Croatia", Some("HR")),
    range(0x502C00, 0x502FFF, "Latvia", Some("LV")),
    range(0x503C00, 0x503FFF, "Lithuania", Some("LT")),
    range(0x504C00, 0x504FFF, "Republic of Moldova", Some("MD")),
    range(0x505C00, 0x505FFF, "Slovakia", Some("SK")),
    range(0x506C00, 0x506FFF, "Slovenia", Some("SI")),
    range(0x508000, 0x50FFFF, "Ukraine", Some("UA")),
    range(0x510000, 0x5103FF, "Belarus", Some("BY")),
    range(0x511000, 0x5113FF, "Estonia", Some("EE")),
    range(0x512000, 0x5123FF, "North Macedonia", Some("MK")),
    range(0x513000, 0x5133FF, "Bosnia and Herzegovina", Some("BA")),
    range(0x514000, 0x5143FF, "Georgia", Some("GE")),
    range(0x515000, 0x5153FF, "Tajikistan", Some("TJ")),
    range(0x600000, 0x6003FF, "Armenia", Some("AM")),
    range(0x600800, 0x600BFF, "Azerbaijan", Some("AZ")),
    range(0x601000, 0x6013FF, "Kyrgyzstan", Some("KG")),
    range(0x601800, 0x601BFF, "Turkmenistan", Some("TM")),
    range(0x680000, 0x6803FF, "Bhutan", Some("BT")),
    range(0x681000, 0x6813FF, "Micronesia", Some("FM")),
    range(0x682000, 0x6823FF, "Mongolia", Some("MN")),
    range(0x683000, 0x6833FF, "Kazakhstan", Some("KZ")),
    range(0x684000, 0x6843FF, "Palau", Some("PW")),
    range(0x700000, 0x700FFF, "Afghanistan", Some("AF")),
    range(0x702000, 0x702FFF, "Bangladesh", Some("BD")),
    range(0x704000, 0x704FFF, "Myanmar", Some("MM")),
    range(0x706000, 0x706FFF, "Kuwait", Some("KW")),
    range(0x708000, 0x708FFF, "Lao People's Democratic Republic", Some("LA")),
    range(0x70A000, 0x70AFFF, "Nepal", Some("NP")),
    range(0x70C000, 0x70C3FF, "Oman", Some("OM")),
    range(0x70E000, 0x70EFFF, "Cambodia", Some("KH")),
    range(0x710000, 0x717FFF, "Saudi Arabia", Some("SA")),
    range(0x718000, 0x71FFFF, "Republic of Korea", Some("KR")),
    range(0x720000, 0x727FFF, "Democratic People's Republic of Korea", Some("KP")),
    range(0x728000, 0x72FFFF, "Iraq", Some("IQ")),
    range(0x730000, 0x737FFF, "Iran (Islamic Republic of)", Some("IR")),
    range(0x738000, 0x73FFFF, "Israel", Some("IL")),
    range(0x740000, 0x747FFF, "Jordan", Some("JO")),
    range(0x748000, 0x74FFFF, "Lebanon", Some("LB")),
    range(0x750000, 0x757FFF, "Malaysia", Some("MY")),
    range(0x758000, 0x75FFFF, "Philippines", Some("PH")),
    range(0x760000, 0x767FFF, "Pakistan", Some("PK")),
    range(0x768000, 0x76FFFF, "Singapore", Some("SG")),
    range(0x770000, 0x777FFF, "Sri Lanka", Some("LK")),
    range(0x778000, 0x77FFFF, "Syrian Arab Republic", Some("SY")),
    range(0x780000, 0x7BFFFF, "China", Some("CN")),
    range(0x7C0000, 0x7FFFFF, "Australia", Some("AU")),
    range(0x800000, 0x83FFFF, "India", Some("IN")),
    range(0x840000, 0x87FFFF, "Japan", Some("JP")),
    range(0x880000, 0x887FFF, "Thailand", Some("TH")),
    range(0x888000, 0x88FFFF, "Viet Nam", Some("VN")),
    range(0x890000, 0x890FFF, "Yemen", Some("YE")),
    range(0x894000, 0x894FFF, "Bahrain", Some("BH")),
    range(0x895000, 0x8953FF, "Brunei Darussalam", Some("BN")),
    range(0x896000, 0x896FFF, "United Arab Emirates", Some("AE")),
    range(0x897000, 0x8973FF, "Solomon Islands", Some("SB")),
    range(0x898000, 0x898FFF, "Papua New Guinea", Some("PG")),
    range(0x899000, 0x8993FF, "Taiwan, Province of China", Some("TW")),
    range(0x8A0000, 0x8A7FFF, "Indonesia", Some("ID")),
    range(0x900000, 0x9003FF, "Marshall Islands", Some("MH")),
    range(0x901000, 0x9013FF, "Cook Islands", Some("CK")),
    range(0x902000, 0x9023FF, "Samoa", Some("WS")),
    range(0xA00000, 0xAFFFFF, "United States", Some("US")),
    range(0xC00000, 0xC3FFFF, "Canada", Some("CA")),
    range(0xC80000, 0xC87FFF, "New Zealand", Some("NZ")),
    range(0xC88000, 0xC88FFF, "Fiji", Some("FJ")),
    range(0xC8A000, 0xC8A3FF, "Nauru", Some("NR")),
    range(0xC8C000, 0xC8C3FF, "Saint Lucia", Some("LC")),
    range(0xC8D000, 0xC8D3FF, "Tonga", Some("TO")),
    range(0xC8E000, 0xC8E3FF, "Kiribati", Some("KI")),
    range(0xC90000, 0xC903FF, "Vanuatu", Some("VU")),
    range(0xD00000, 0xDFFFFF, "Reserved", None),
    range(0xE00000, 0xE3FFFF, "Argentina", Some("AR")),
    range(0xE40000, 0xE7FFFF, "Brazil", Some("BR")),
    range(0xE80000, 0xE80FFF, "Chile", Some("CL")),
    range(0xE84000, 0xE84FFF, "Ecuador", Some("EC")),
    range(0xE88000, 0xE88FFF, "Paraguay", Some("PY")),
    range(0xE8C000, 0xE8CFFF, "Peru", Some("PE")),
    range(0xE90000, 0xE90FFF, "Uruguay", Some("UY")),
    range(0xE94000, 0xE94FFF, "Bolivia (Plurinational State of)", Some("BO")),
];

/// Number of allocation blocks in the embedded table.
pub fn table_len() -> usize {
    ALLOCATIONS.len()
}

/// Resolves a hex address string to its registration country.
///
/// Total: malformed input and unallocated addresses yield an empty
/// `Registration` rather than an error.
pub fn lookup(icao_hex: &str) -> Registration {
    match icao_hex.parse::<IcaoAddress>() {
        Ok(addr) => lookup_address(addr),
        Err(_) => Registration::default(),
    }
}

/// Resolves a parsed address to its registration country.
pub fn lookup_address(addr: IcaoAddress) -> Registration {
    let value = addr.value();
    // Index of the first block starting after `value`; the candidate is the one before it.
    let idx = ALLOCATIONS.partition_point(|r| r.start <= value);
    if idx == 0 {
        return Registration::default();
    }

    let block = &ALLOCATIONS[idx - 1];
    if value <= block.end {
        Registration {
            country: Some(block.country),
            code: block.code,
        }
    } else {
        Registration::default()
    }
}
