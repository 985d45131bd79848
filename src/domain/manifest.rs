//! Package manifest graph and its XML serialization.
//!
//! The manifest is an IMS Content Packaging style index: one `resource`
//! element per packaged unit plus one per metadata file and asset, with
//! `dependency` elements wiring the graph together. Serialization goes
//! through a quick-xml writer rather than string concatenation.

use anyhow::Result;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::domain::{ContentId, Role};

/// Resource type vocabulary carried in the manifest `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Item,
    Stim,
    Metadata,
    OtherAsset,
}

impl ResourceType {
    pub fn tag(&self) -> &'static str {
        match self {
            ResourceType::Item => "imsqti_apipitem_xmlv2p2",
            ResourceType::Stim => "imsqti_apipstimulus_xmlv2p2",
            ResourceType::Metadata => "resourcemetadata/apipv1p0",
            ResourceType::OtherAsset => {
                "associatedcontent/apip_xmlv1p0/learning-application-resource"
            }
        }
    }
}

/// A dependent file resource: an asset or the metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub identifier: String,
    pub resource_type: ResourceType,
    pub href: String,
}

/// One packaged content unit and its dependency edges.
///
/// Created when the packager begins an id, mutated while files are
/// classified and the content document is parsed, then frozen into the
/// graph's Items or Stimuli list.
#[derive(Debug, Clone)]
pub struct ManifestNode {
    pub identifier: String,
    pub resource_type: ResourceType,
    pub folder: String,
    pub href: String,
    pub assets: Vec<AssetRef>,
    pub metadata: Option<AssetRef>,
    pub word_list: Option<String>,
    pub tutorial: Option<String>,
    pub stimulus: Option<String>,
}

impl ManifestNode {
    pub fn for_id(id: &ContentId) -> Self {
        let identifier = id.canonical();
        let folder = id.archive_folder();
        let href = format!("{}{}", folder, id.content_file_name());
        Self {
            identifier,
            resource_type: match id.role {
                Role::Item => ResourceType::Item,
                Role::Stim => ResourceType::Stim,
            },
            folder,
            href,
            assets: Vec::new(),
            metadata: None,
            word_list: None,
            tutorial: None,
            stimulus: None,
        }
    }

    /// Record an admitted file as an asset dependency. The identifier is
    /// the file name with dots turned into underscores.
    pub fn add_asset(&mut self, file_name: &str) {
        self.assets.push(AssetRef {
            identifier: file_name.replace('.', "_"),
            resource_type: ResourceType::OtherAsset,
            href: format!("{}{}", self.folder, file_name),
        });
    }

    /// Record the unit's `metadata.xml`.
    pub fn set_metadata(&mut self) {
        self.metadata = Some(AssetRef {
            identifier: format!("{}_metadata", self.identifier),
            resource_type: ResourceType::Metadata,
            href: format!("{}metadata.xml", self.folder),
        });
    }
}

/// Stub written when manifest generation is disabled.
pub const EMPTY_MANIFEST: &str =
    "<manifest xmlns=\"http://www.imsglobal.org/xsd/apip/apipv1p0/imscp_v1p1\"></manifest>";

const MANIFEST_NS: &str = "http://www.imsglobal.org/xsd/apip/apipv1p0/imscp_v1p1";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.imsglobal.org/xsd/apip/apipv1p0/imscp_v1p1 \
     http://www.imsglobal.org/profile/apip/apipv1p0/apipv1p0_imscpv1p2_v1p0.xsd";
const LOM_NS: &str = "http://ltsc.ieee.org/xsd/apipv1p0/LOM/manifest";

/// Accumulates the packaged units and serializes `imsmanifest.xml`.
#[derive(Debug, Default)]
pub struct ManifestGraph {
    pub items: Vec<ManifestNode>,
    pub stims: Vec<ManifestNode>,
}

impl ManifestGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished node to the Items or Stimuli list.
    pub fn push(&mut self, node: ManifestNode) {
        match node.resource_type {
            ResourceType::Stim => self.stims.push(node),
            _ => self.items.push(node),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.stims.is_empty()
    }

    /// Serialize the full manifest document.
    pub fn to_xml(&self) -> Result<String> {
        let mut w = Writer::new(Vec::new());

        let mut manifest = BytesStart::new("manifest");
        manifest.push_attribute(("identifier", "MANIFEST-QTI-1"));
        manifest.push_attribute(("xmlns", MANIFEST_NS));
        manifest.push_attribute(("xmlns:xsi", XSI_NS));
        manifest.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
        w.write_event(Event::Start(manifest))?;

        w.write_event(Event::Start(BytesStart::new("metadata")))?;
        w.write_event(Event::Start(BytesStart::new("schema")))?;
        w.write_event(Event::Text(BytesText::new("APIP Test")))?;
        w.write_event(Event::End(BytesEnd::new("schema")))?;
        w.write_event(Event::Start(BytesStart::new("schemaversion")))?;
        w.write_event(Event::Text(BytesText::new("1.0.0")))?;
        w.write_event(Event::End(BytesEnd::new("schemaversion")))?;
        let mut lom = BytesStart::new("lom");
        lom.push_attribute(("xmlns", LOM_NS));
        w.write_event(Event::Start(lom))?;
        w.write_event(Event::End(BytesEnd::new("lom")))?;
        w.write_event(Event::End(BytesEnd::new("metadata")))?;
        w.write_event(Event::Empty(BytesStart::new("organizations")))?;

        w.write_event(Event::Start(BytesStart::new("resources")))?;
        for item in &self.items {
            Self::write_unit(&mut w, item, UnitKind::Item)?;
        }
        for stim in &self.stims {
            Self::write_unit(&mut w, stim, UnitKind::Stim)?;
        }
        w.write_event(Event::End(BytesEnd::new("resources")))?;
        w.write_event(Event::End(BytesEnd::new("manifest")))?;

        Ok(String::from_utf8(w.into_inner())?)
    }

    fn write_unit(w: &mut Writer<Vec<u8>>, node: &ManifestNode, kind: UnitKind) -> Result<()> {
        let mut resource = BytesStart::new("resource");
        resource.push_attribute(("identifier", node.identifier.as_str()));
        resource.push_attribute(("type", node.resource_type.tag()));
        w.write_event(Event::Start(resource))?;
        Self::write_file(w, &node.href)?;

        // Dependency order differs between items and stimuli; both end
        // with the metadata reference.
        match kind {
            UnitKind::Item => {
                for asset in &node.assets {
                    Self::write_dependency(w, &asset.identifier)?;
                }
                if let Some(ref wit) = node.word_list {
                    Self::write_dependency(w, wit)?;
                }
                if let Some(ref tut) = node.tutorial {
                    Self::write_dependency(w, tut)?;
                }
                if let Some(ref stim) = node.stimulus {
                    Self::write_dependency(w, stim)?;
                }
            }
            UnitKind::Stim => {
                if let Some(ref wit) = node.word_list {
                    Self::write_dependency(w, wit)?;
                }
                for asset in &node.assets {
                    Self::write_dependency(w, &asset.identifier)?;
                }
            }
        }
        if let Some(ref metadata) = node.metadata {
            Self::write_dependency(w, &metadata.identifier)?;
        }
        w.write_event(Event::End(BytesEnd::new("resource")))?;

        if let Some(ref metadata) = node.metadata {
            Self::write_file_resource(w, metadata)?;
        }
        for asset in &node.assets {
            Self::write_file_resource(w, asset)?;
        }
        Ok(())
    }

    fn write_file(w: &mut Writer<Vec<u8>>, href: &str) -> Result<()> {
        let mut file = BytesStart::new("file");
        file.push_attribute(("href", href));
        w.write_event(Event::Empty(file))?;
        Ok(())
    }

    fn write_dependency(w: &mut Writer<Vec<u8>>, identifier: &str) -> Result<()> {
        let mut dep = BytesStart::new("dependency");
        dep.push_attribute(("identifierref", identifier));
        w.write_event(Event::Empty(dep))?;
        Ok(())
    }

    fn write_file_resource(w: &mut Writer<Vec<u8>>, asset: &AssetRef) -> Result<()> {
        let mut resource = BytesStart::new("resource");
        resource.push_attribute(("identifier", asset.identifier.as_str()));
        resource.push_attribute(("type", asset.resource_type.tag()));
        w.write_event(Event::Start(resource))?;
        Self::write_file(w, &asset.href)?;
        w.write_event(Event::End(BytesEnd::new("resource")))?;
        Ok(())
    }
}

enum UnitKind {
    Item,
    Stim,
}
