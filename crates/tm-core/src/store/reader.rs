//! Model image reader.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::config::{EscapeMethod, ModelForm};
use crate::cpt::CumulativeTable;
use crate::error::{ModelError, Result};
use crate::model::PpmModel;
use crate::trie::Trie;

use super::{FORMAT_VERSION, MAX_ARRAY_WORDS, MODEL_TYPE_PPM};

const MAX_TITLE_BYTES: usize = 1 << 16;

fn read_zstr<R: Read>(r: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let byte = r.read_u8()?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
        if bytes.len() > MAX_TITLE_BYTES {
            return Err(ModelError::CorruptModel("unterminated title".into()));
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Loads one model image, in whatever form it was written.
pub(crate) fn read_model<R: Read>(r: &mut R) -> Result<PpmModel> {
    let version = r.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(ModelError::UnsupportedVersion {
            version,
            supported: FORMAT_VERSION,
        });
    }
    let model_type = r.read_u32::<LittleEndian>()?;
    if model_type != MODEL_TYPE_PPM {
        return Err(ModelError::UnknownModelType(model_type));
    }
    let form = ModelForm::from_u32(r.read_u32::<LittleEndian>()?)
        .ok_or_else(|| ModelError::CorruptModel("bad model form".into()))?;
    let title = read_zstr(r)?;
    let alphabet_size = r.read_u32::<LittleEndian>()?;
    if alphabet_size >= crate::symbol::SENTINEL {
        return Err(ModelError::CorruptModel(format!(
            "alphabet size {alphabet_size} collides with reserved symbols"
        )));
    }
    let max_symbol = r.read_u32::<LittleEndian>()?;
    let max_order = r.read_i32::<LittleEndian>()?;
    if max_order < -1 {
        return Err(ModelError::CorruptModel(format!(
            "max_order {max_order} below -1"
        )));
    }
    let escape_method = EscapeMethod::from_u32(r.read_u32::<LittleEndian>()?)
        .ok_or_else(|| ModelError::CorruptModel("bad escape method".into()))?;
    if escape_method == EscapeMethod::B {
        return Err(ModelError::EscapeMethodUnimplemented);
    }
    let full_exclusions = r.read_u32::<LittleEndian>()? != 0;
    let update_exclusions = r.read_u32::<LittleEndian>()? != 0;

    let trie = if max_order >= 0 {
        let words = r.read_u32::<LittleEndian>()?;
        if words == 0 || words > MAX_ARRAY_WORDS {
            return Err(ModelError::CorruptModel(format!(
                "trie size {words} out of range"
            )));
        }
        let mut nodes = Vec::with_capacity(words as usize);
        for _ in 0..words {
            nodes.push(r.read_i32::<LittleEndian>()?);
        }

        let input = if form == ModelForm::Dynamic {
            let size = r.read_u32::<LittleEndian>()?;
            let len = r.read_u32::<LittleEndian>()?;
            if size == 0 || size > MAX_ARRAY_WORDS || len != size - 1 {
                return Err(ModelError::CorruptModel(format!(
                    "input log size {size} / length {len} inconsistent"
                )));
            }
            let mut input = Vec::with_capacity(size as usize);
            for _ in 0..size {
                input.push(r.read_u32::<LittleEndian>()?);
            }
            input
        } else {
            vec![0]
        };
        Some(Trie::from_image(form, nodes, input))
    } else {
        None
    };

    let ptable = if alphabet_size == 0 {
        Some(CumulativeTable::read_image(r)?)
    } else {
        None
    };

    debug!(title = %title, ?form, max_order, "read model image");
    Ok(PpmModel {
        title,
        form,
        alphabet_size,
        max_symbol,
        max_order,
        escape_method,
        full_exclusions,
        update_exclusions,
        trie,
        ptable,
    })
}
