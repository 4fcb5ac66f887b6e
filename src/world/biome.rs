//! Registry data sent by the Java server during configuration.

use crate::{catalog::BiomeTable, protocol::nbt::Compound};
use ahash::AHashMap;

const BIOME_REGISTRY: &str = "minecraft:worldgen/biome";
const DIMENSION_TYPE_REGISTRY: &str = "minecraft:dimension_type";

/// Vertical extent of a Java dimension type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DimensionType {
    pub min_y: i32,
    pub height: i32,
}

impl DimensionType {
    pub const OVERWORLD: DimensionType = DimensionType {
        min_y: -64,
        height: 384,
    };

    pub fn section_count(self) -> usize {
        usize::try_from(self.height / 16).unwrap_or(0)
    }
}

/// The parts of the registry codec the bridge needs.
#[derive(Debug, Default, Clone)]
pub struct RegistryInfo {
    /// `(name, network id)` for every biome.
    pub biomes: Vec<(String, i32)>,
    pub dimension_types: AHashMap<String, DimensionType>,
}

impl RegistryInfo {
    pub fn parse(codec: &Compound) -> Self {
        let mut info = RegistryInfo::default();
        for (name, id, _) in registry_entries(codec, BIOME_REGISTRY) {
            info.biomes.push((name.to_owned(), id));
        }
        for (name, _, element) in registry_entries(codec, DIMENSION_TYPE_REGISTRY) {
            let (Some(min_y), Some(height)) = (element.get_i64("min_y"), element.get_i64("height"))
            else {
                tracing::warn!("Dimension type {name} lacks min_y/height");
                continue;
            };
            info.dimension_types.insert(
                name.to_owned(),
                DimensionType {
                    min_y: min_y as i32,
                    height: height as i32,
                },
            );
        }
        info
    }
}

fn registry_entries<'a>(
    codec: &'a Compound,
    registry: &str,
) -> impl Iterator<Item = (&'a str, i32, &'a Compound)> + 'a {
    codec
        .get_compound(registry)
        .and_then(|registry| registry.get_list("value"))
        .into_iter()
        .flat_map(|list| list.compounds())
        .filter_map(|entry| {
            Some((
                entry.get_str("name")?,
                entry.get_i64("id")? as i32,
                entry.get_compound("element")?,
            ))
        })
}

/// Java biome network ids to Bedrock biome ids.
#[derive(Debug, Clone, Default)]
pub struct BiomeRemap {
    by_java_id: AHashMap<i32, u32>,
}

impl BiomeRemap {
    /// Passes ids through unchanged until registry data arrives.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Resolves each registry biome by name, then by category, falling back to
    /// the Java id itself.
    pub fn new(biomes: &[(String, i32)], table: &BiomeTable) -> Self {
        let mut by_java_id = AHashMap::with_capacity(biomes.len());
        for (name, java_id) in biomes {
            let bedrock_id = match table.by_java_name(name) {
                Some(entry) => entry.bedrock_id,
                None => match category_for(name, table) {
                    Some(id) => id,
                    None => {
                        tracing::debug!("No Bedrock biome for {name}, passing id {java_id} through");
                        *java_id as u32
                    }
                },
            };
            by_java_id.insert(*java_id, bedrock_id);
        }
        Self { by_java_id }
    }

    pub fn remap(&self, java_id: i32) -> u32 {
        self.by_java_id
            .get(&java_id)
            .copied()
            .unwrap_or(java_id as u32)
    }

    pub fn len(&self) -> usize {
        self.by_java_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_java_id.is_empty()
    }
}

/// Longest category name contained in the biome's path.
fn category_for(name: &str, table: &BiomeTable) -> Option<u32> {
    let path = name.rsplit(':').next().unwrap_or(name);
    table
        .categories()
        .filter(|(category, _)| path.contains(category))
        .max_by_key(|(category, _)| category.len())
        .map(|(_, id)| id)
}
