use std::collections::BTreeMap;

use serde::Deserialize;

use crate::bundle::Bundle;
use crate::codespace::{Codepoint, Codespace, StorageWidth};
use crate::emit::Fragment;
use crate::error::Error;
use crate::features::Context;

/// A break feature's document: the precomputed state-machine text, the
/// machine's state count, and one codepoint→class table per property the
/// feature registered.
#[derive(Deserialize)]
struct BreakDoc {
    source: String,
    header: String,
    size: usize,
    states: u32,
    #[serde(flatten)]
    tables: BTreeMap<String, Vec<(Codepoint, u32)>>,
}

pub fn register_grapheme_break(space: &mut Codespace) {
    space.register("gcb", 0, StorageWidth::Uint8);
    space.register("incb", 0, StorageWidth::Uint8);
}

pub fn ingest_grapheme_break(
    bundle: &mut Bundle,
    space: &mut Codespace,
    ctx: &mut Context,
) -> Result<Fragment, Error> {
    ingest_break(
        bundle,
        space,
        ctx,
        "gcb.json",
        &["gcb", "incb"],
        "UNI_FEATURE_GCB",
    )
}

pub fn register_word_break(space: &mut Codespace) {
    space.register("wb", 0, StorageWidth::Uint8);
    space.register("wbx", 0, StorageWidth::Uint8);
}

pub fn ingest_word_break(
    bundle: &mut Bundle,
    space: &mut Codespace,
    ctx: &mut Context,
) -> Result<Fragment, Error> {
    ingest_break(
        bundle,
        space,
        ctx,
        "wb.json",
        &["wb", "wbx"],
        "UNI_FEATURE_WB",
    )
}

pub fn register_sentence_break(space: &mut Codespace) {
    space.register("sb", 0, StorageWidth::Uint8);
}

pub fn ingest_sentence_break(
    bundle: &mut Bundle,
    space: &mut Codespace,
    ctx: &mut Context,
) -> Result<Fragment, Error> {
    ingest_break(bundle, space, ctx, "sb.json", &["sb"], "UNI_FEATURE_SB")
}

fn ingest_break(
    bundle: &mut Bundle,
    space: &mut Codespace,
    ctx: &mut Context,
    entry: &str,
    columns: &[&str],
    marker: &str,
) -> Result<Fragment, Error> {
    let doc: BreakDoc = bundle.read_json(entry)?;

    // The runtime sizes its resumable-state scratch space for the
    // largest machine across every break feature in the build.
    ctx.max_break_states = ctx.max_break_states.max(doc.states);

    for &name in columns {
        let table = doc
            .tables
            .get(name)
            .ok_or_else(|| format!("bundle entry '{}' has no '{}' table", entry, name))?;
        let column = space.id(name);
        for &(cp, value) in table {
            space.set(cp, column, value);
        }
    }

    Ok(Fragment {
        source: doc.source,
        header: doc.header,
        public_header: format!("#define {}\n", marker),
        size: doc.size,
    })
}

#[derive(Deserialize)]
struct SegmentationDoc {
    header: String,
}

/// Emits the shared break driver header once every break feature has
/// reported its state count.
pub fn finish(bundle: &mut Bundle, ctx: &mut Context) -> Result<Fragment, Error> {
    let doc: SegmentationDoc = bundle.read_json("segmentation.json")?;

    let mut header = doc.header;
    header.push_str(&format!("#define MAX_BREAK_STATES {}\n", ctx.max_break_states));

    Ok(Fragment {
        source: String::new(),
        header,
        public_header: "#define UNI_FEATURE_SEGMENTATION\n".to_string(),
        size: 0,
    })
}
