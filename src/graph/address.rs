//! Section table and absolute-address resolution.
//!
//! Symbols arrive as (section, offset) pairs; the section table turns them into absolute
//! addresses as `image_base + section.rva + offset`. Section ids are 1-based; id 0 is a
//! synthetic image-base pseudo-section covering the headers, so header-relative symbols
//! resolve without a real section record.

use std::collections::BTreeMap;

use crate::graph::arena::TypeGraph;
use crate::graph::node::{Address, NodeId};
use crate::symbols::records::SectionRecord;
use crate::Result;

/// Default load base of the target binary.
pub const DEFAULT_IMAGE_BASE: u64 = 0x1_4000_0000;

/// Size of the synthetic image-base pseudo-section.
pub const IMAGE_BASE_SECTION_SIZE: u64 = 0x1000;

/// One section of the target binary.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section id.
    pub id: u16,
    /// Relative virtual address of the section start.
    pub rva: u64,
    /// Byte size.
    pub size: u64,
    /// Section name.
    pub name: String,
}

/// Immutable, id-indexed section table with a configured image base.
#[derive(Debug)]
pub struct SectionTable {
    sections: BTreeMap<u16, Section>,
    image_base: u64,
}

impl SectionTable {
    /// Builds the table from dumped section records, inserting the synthetic id-0
    /// pseudo-section unless the dump provided one.
    ///
    /// # Errors
    /// Returns [`crate::Error::DuplicateRecord`] on a repeated section id.
    pub fn new<'a, I>(records: I, image_base: u64) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SectionRecord>,
    {
        let mut sections = BTreeMap::new();
        for record in records {
            let section = Section {
                id: record.id,
                rva: record.rva,
                size: record.size,
                name: record.name.clone(),
            };
            if sections.insert(record.id, section).is_some() {
                return Err(crate::Error::DuplicateRecord(u32::from(record.id)));
            }
        }
        sections.entry(0).or_insert(Section {
            id: 0,
            rva: 0,
            size: IMAGE_BASE_SECTION_SIZE,
            name: ".imagebase".to_string(),
        });
        Ok(SectionTable { sections, image_base })
    }

    /// Configured load base.
    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    /// Section by id.
    #[must_use]
    pub fn get(&self, id: u16) -> Option<&Section> {
        self.sections.get(&id)
    }

    /// Number of sections, counting the synthetic one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Always false; the synthetic section is inserted unconditionally.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Resolves a (section, offset) pair to an absolute address.
    ///
    /// # Errors
    /// Returns [`crate::Error::SectionNotFound`] for an unknown section id.
    pub fn absolute(&self, address: Address) -> Result<u64> {
        let section = self
            .sections
            .get(&address.section)
            .ok_or(crate::Error::SectionNotFound(address.section))?;
        Ok(self.image_base + section.rva + address.offset)
    }
}

/// Resolves every bound (section, offset) pair in the graph to an absolute address.
///
/// Node-level addresses and the per-member address cells of aggregates are all resolved;
/// re-resolution of an identical pair is a no-op, a conflicting one is fatal.
///
/// # Errors
/// Fatal on unknown section ids and on conflicting re-resolution.
pub fn resolve_addresses(graph: &mut TypeGraph, table: &SectionTable) -> Result<()> {
    let ids: Vec<NodeId> = graph.ids();
    for id in ids {
        let node_address = graph.node(id)?.address();
        if let Some(address) = node_address {
            let absolute = table.absolute(address)?;
            graph.node_mut(id)?.set_absolute(absolute)?;
        }

        let member_addresses: Option<(Vec<Option<Address>>, Vec<Option<Address>>)> = graph
            .node(id)?
            .aggregate()
            .map(|data| {
                (
                    data.statics.iter().map(|s| s.address).collect(),
                    data.methods.iter().map(|m| m.address).collect(),
                )
            });
        let Some((static_addresses, method_addresses)) = member_addresses else {
            continue;
        };

        let static_absolutes: Vec<Option<u64>> = static_addresses
            .iter()
            .map(|addr| addr.map(|a| table.absolute(a)).transpose())
            .collect::<Result<_>>()?;
        let method_absolutes: Vec<Option<u64>> = method_addresses
            .iter()
            .map(|addr| addr.map(|a| table.absolute(a)).transpose())
            .collect::<Result<_>>()?;

        let node_id = id.raw();
        if let Some(data) = graph.node_mut(id)?.aggregate_mut() {
            for (member, absolute) in data.statics.iter_mut().zip(static_absolutes) {
                bind_absolute(&mut member.absolute, absolute, node_id)?;
            }
            for (member, absolute) in data.methods.iter_mut().zip(method_absolutes) {
                bind_absolute(&mut member.absolute, absolute, node_id)?;
            }
        }
    }
    Ok(())
}

fn bind_absolute(cell: &mut Option<u64>, absolute: Option<u64>, node: u32) -> Result<()> {
    let Some(absolute) = absolute else {
        return Ok(());
    };
    match *cell {
        None => {
            *cell = Some(absolute);
            Ok(())
        }
        Some(existing) if existing == absolute => Ok(()),
        Some(existing) => Err(crate::Error::AddressConflict {
            node,
            old_section: 0,
            old_offset: existing,
            new_section: 0,
            new_offset: absolute,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SectionTable {
        let records = vec![
            SectionRecord {
                id: 1,
                rva: 0x1000,
                size: 0x2000,
                align: 16,
                characteristics: 0,
                name: ".text".to_string(),
            },
            SectionRecord {
                id: 2,
                rva: 0x4000,
                size: 0x1000,
                align: 16,
                characteristics: 0,
                name: ".data".to_string(),
            },
        ];
        SectionTable::new(&records, DEFAULT_IMAGE_BASE).unwrap()
    }

    #[test]
    fn test_absolute_resolution() {
        let table = table();
        let absolute = table.absolute(Address { section: 1, offset: 0x10 }).unwrap();
        assert_eq!(absolute, DEFAULT_IMAGE_BASE + 0x1000 + 0x10);
    }

    #[test]
    fn test_synthetic_image_base_section() {
        let table = table();
        let absolute = table.absolute(Address { section: 0, offset: 0x80 }).unwrap();
        assert_eq!(absolute, DEFAULT_IMAGE_BASE + 0x80);
        assert_eq!(table.get(0).unwrap().size, IMAGE_BASE_SECTION_SIZE);
    }

    #[test]
    fn test_missing_section_is_fatal() {
        let table = table();
        let result = table.absolute(Address { section: 9, offset: 0 });
        assert!(matches!(result, Err(crate::Error::SectionNotFound(9))));
    }

    #[test]
    fn test_duplicate_section_id_is_fatal() {
        let records = vec![
            SectionRecord {
                id: 1,
                rva: 0,
                size: 1,
                align: 0,
                characteristics: 0,
                name: String::new(),
            },
            SectionRecord {
                id: 1,
                rva: 2,
                size: 1,
                align: 0,
                characteristics: 0,
                name: String::new(),
            },
        ];
        assert!(matches!(
            SectionTable::new(&records, DEFAULT_IMAGE_BASE),
            Err(crate::Error::DuplicateRecord(1))
        ));
    }
}
