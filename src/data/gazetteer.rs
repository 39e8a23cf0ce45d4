//! Built-in gazetteer of major cities
//!
//! Text queries are matched against this table before any search provider is
//! contacted, so common lookups are answered deterministically and offline.

use super::{Coordinate, LocationCandidate};

/// A city known without a network lookup
#[derive(Debug, Clone, Copy)]
pub struct GazetteerEntry {
    /// English name
    pub name: &'static str,
    /// Name in the local script
    pub native_name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub address: &'static str,
}

impl GazetteerEntry {
    /// Converts the entry into a search candidate
    pub fn to_candidate(&self) -> Option<LocationCandidate> {
        let coordinate = Coordinate::new(self.longitude, self.latitude).ok()?;
        Some(LocationCandidate {
            coordinate,
            display_name: self.name.to_string(),
            address: self.address.to_string(),
        })
    }
}

/// How query text is compared against entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Plain substring comparison
    Exact,
    /// Substring comparison after lowercasing both sides
    CaseInsensitive,
}

/// Location used by callers when resolution fails entirely
pub static DEFAULT_LOCATION: &GazetteerEntry = &CITIES[0];

/// Static table of major cities, in display order
pub static CITIES: [GazetteerEntry; 40] = [
    GazetteerEntry { name: "Beijing", native_name: "北京", latitude: 39.9042, longitude: 116.4074, address: "China Beijing" },
    GazetteerEntry { name: "Shanghai", native_name: "上海", latitude: 31.2304, longitude: 121.4737, address: "China Shanghai" },
    GazetteerEntry { name: "Guangzhou", native_name: "广州", latitude: 23.1291, longitude: 113.2644, address: "China Guangdong Guangzhou" },
    GazetteerEntry { name: "Shenzhen", native_name: "深圳", latitude: 22.5431, longitude: 114.0579, address: "China Guangdong Shenzhen" },
    GazetteerEntry { name: "Hangzhou", native_name: "杭州", latitude: 30.2741, longitude: 120.1551, address: "China Zhejiang Hangzhou" },
    GazetteerEntry { name: "Nanjing", native_name: "南京", latitude: 32.0603, longitude: 118.7969, address: "China Jiangsu Nanjing" },
    GazetteerEntry { name: "Chengdu", native_name: "成都", latitude: 30.5728, longitude: 104.0668, address: "China Sichuan Chengdu" },
    GazetteerEntry { name: "Xi'an", native_name: "西安", latitude: 34.3416, longitude: 108.9398, address: "China Shaanxi Xi'an" },
    GazetteerEntry { name: "Wuhan", native_name: "武汉", latitude: 30.5928, longitude: 114.3055, address: "China Hubei Wuhan" },
    GazetteerEntry { name: "Chongqing", native_name: "重庆", latitude: 29.5647, longitude: 106.5507, address: "China Chongqing" },
    GazetteerEntry { name: "Tianjin", native_name: "天津", latitude: 39.3434, longitude: 117.3616, address: "China Tianjin" },
    GazetteerEntry { name: "Suzhou", native_name: "苏州", latitude: 31.2989, longitude: 120.5853, address: "China Jiangsu Suzhou" },
    GazetteerEntry { name: "Qingdao", native_name: "青岛", latitude: 36.0986, longitude: 120.3719, address: "China Shandong Qingdao" },
    GazetteerEntry { name: "Dalian", native_name: "大连", latitude: 38.9140, longitude: 121.6147, address: "China Liaoning Dalian" },
    GazetteerEntry { name: "Xiamen", native_name: "厦门", latitude: 24.4798, longitude: 118.0894, address: "China Fujian Xiamen" },
    GazetteerEntry { name: "Changsha", native_name: "长沙", latitude: 28.2282, longitude: 112.9388, address: "China Hunan Changsha" },
    GazetteerEntry { name: "Jinan", native_name: "济南", latitude: 36.6512, longitude: 117.1201, address: "China Shandong Jinan" },
    GazetteerEntry { name: "Harbin", native_name: "哈尔滨", latitude: 45.8038, longitude: 126.5349, address: "China Heilongjiang Harbin" },
    GazetteerEntry { name: "Zhengzhou", native_name: "郑州", latitude: 34.7466, longitude: 113.6254, address: "China Henan Zhengzhou" },
    GazetteerEntry { name: "Changchun", native_name: "长春", latitude: 43.8171, longitude: 125.3235, address: "China Jilin Changchun" },
    GazetteerEntry { name: "Shenyang", native_name: "沈阳", latitude: 41.8057, longitude: 123.4315, address: "China Liaoning Shenyang" },
    GazetteerEntry { name: "Kunming", native_name: "昆明", latitude: 25.0389, longitude: 102.7183, address: "China Yunnan Kunming" },
    GazetteerEntry { name: "Fuzhou", native_name: "福州", latitude: 26.0745, longitude: 119.2965, address: "China Fujian Fuzhou" },
    GazetteerEntry { name: "Wuxi", native_name: "无锡", latitude: 31.4912, longitude: 120.3124, address: "China Jiangsu Wuxi" },
    GazetteerEntry { name: "Hefei", native_name: "合肥", latitude: 31.8206, longitude: 117.2272, address: "China Anhui Hefei" },
    GazetteerEntry { name: "Shijiazhuang", native_name: "石家庄", latitude: 38.0428, longitude: 114.5149, address: "China Hebei Shijiazhuang" },
    GazetteerEntry { name: "Ningbo", native_name: "宁波", latitude: 29.8683, longitude: 121.5440, address: "China Zhejiang Ningbo" },
    GazetteerEntry { name: "Foshan", native_name: "佛山", latitude: 23.0218, longitude: 113.1219, address: "China Guangdong Foshan" },
    GazetteerEntry { name: "Dongguan", native_name: "东莞", latitude: 23.0489, longitude: 113.7447, address: "China Guangdong Dongguan" },
    GazetteerEntry { name: "Wenzhou", native_name: "温州", latitude: 28.0000, longitude: 120.6667, address: "China Zhejiang Wenzhou" },
    GazetteerEntry { name: "Quanzhou", native_name: "泉州", latitude: 24.8740, longitude: 118.6757, address: "China Fujian Quanzhou" },
    GazetteerEntry { name: "Yantai", native_name: "烟台", latitude: 37.5365, longitude: 121.3914, address: "China Shandong Yantai" },
    GazetteerEntry { name: "Jiaxing", native_name: "嘉兴", latitude: 30.7467, longitude: 120.7550, address: "China Zhejiang Jiaxing" },
    GazetteerEntry { name: "Jinhua", native_name: "金华", latitude: 29.1028, longitude: 119.6472, address: "China Zhejiang Jinhua" },
    GazetteerEntry { name: "Taizhou", native_name: "台州", latitude: 28.6568, longitude: 121.4281, address: "China Zhejiang Taizhou" },
    GazetteerEntry { name: "Shaoxing", native_name: "绍兴", latitude: 30.0023, longitude: 120.5810, address: "China Zhejiang Shaoxing" },
    GazetteerEntry { name: "Huzhou", native_name: "湖州", latitude: 30.8703, longitude: 120.0937, address: "China Zhejiang Huzhou" },
    GazetteerEntry { name: "Lishui", native_name: "丽水", latitude: 28.4517, longitude: 119.9219, address: "China Zhejiang Lishui" },
    GazetteerEntry { name: "Quzhou", native_name: "衢州", latitude: 28.9700, longitude: 118.8733, address: "China Zhejiang Quzhou" },
    GazetteerEntry { name: "Zhoushan", native_name: "舟山", latitude: 30.0360, longitude: 122.2070, address: "China Zhejiang Zhoushan" },
];

fn entry_matches(entry: &GazetteerEntry, query: &str, mode: MatchMode) -> bool {
    let fold = |s: &str| match mode {
        MatchMode::Exact => s.to_string(),
        MatchMode::CaseInsensitive => s.to_lowercase(),
    };
    let query = fold(query);
    let name = fold(entry.name);
    let native = fold(entry.native_name);
    let address = fold(entry.address);

    name.contains(&query)
        || query.contains(&name)
        || native.contains(&query)
        || query.contains(&native)
        || address.contains(&query)
}

/// Finds every gazetteer city matching `query`, in table order
///
/// A city matches when its name contains the query, the query contains its
/// name (in either script), or its address contains the query. Blank queries
/// match nothing.
pub fn search_gazetteer(query: &str, mode: MatchMode) -> Vec<LocationCandidate> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    CITIES
        .iter()
        .filter(|entry| entry_matches(entry, query, mode))
        .filter_map(GazetteerEntry::to_candidate)
        .collect()
}
