//! Model image writer.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::config::ModelForm;
use crate::error::{ModelError, Result};
use crate::model::PpmModel;
use crate::trie::Trie;

use super::{FORMAT_VERSION, MODEL_TYPE_PPM};

pub(crate) fn write_zstr<W: Write>(w: &mut W, s: &str) -> Result<()> {
    debug_assert!(!s.as_bytes().contains(&0), "titles must not contain NUL");
    w.write_all(s.as_bytes())?;
    w.write_all(&[0])?;
    Ok(())
}

fn write_arena<W: Write>(w: &mut W, trie: &Trie) -> Result<()> {
    let words = trie.words();
    w.write_u32::<LittleEndian>(words.len() as u32)?;
    for &word in words {
        w.write_i32::<LittleEndian>(word)?;
    }
    Ok(())
}

fn write_input<W: Write>(w: &mut W, trie: &Trie) -> Result<()> {
    let input = trie.input_words();
    w.write_u32::<LittleEndian>(input.len() as u32)?;
    w.write_u32::<LittleEndian>(trie.input_len())?;
    for &symbol in input {
        w.write_u32::<LittleEndian>(symbol)?;
    }
    Ok(())
}

/// Writes `model` in the requested form.
///
/// A dynamic model written in static form is compacted on the way out
/// (the main reason to write one); written in dynamic form, its input
/// log is compacted in place first. A statically loaded model cannot
/// produce a dynamic image: the learning-side state is gone.
pub(crate) fn write_model<W: Write>(
    w: &mut W,
    model: &mut PpmModel,
    form: ModelForm,
) -> Result<()> {
    if form == ModelForm::Dynamic && model.form == ModelForm::Static {
        return Err(ModelError::DynamicWriteFromStatic);
    }

    w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    w.write_u32::<LittleEndian>(MODEL_TYPE_PPM)?;
    w.write_u32::<LittleEndian>(form.as_u32())?;
    write_zstr(w, &model.title)?;
    w.write_u32::<LittleEndian>(model.alphabet_size)?;
    w.write_u32::<LittleEndian>(model.max_symbol)?;
    w.write_i32::<LittleEndian>(model.max_order)?;
    w.write_u32::<LittleEndian>(model.escape_method.as_u32())?;
    w.write_u32::<LittleEndian>(u32::from(model.full_exclusions))?;
    w.write_u32::<LittleEndian>(u32::from(model.update_exclusions))?;

    if model.max_order >= 0 {
        let max_order = model.max_order;
        let online_form = model.form;
        if let Some(trie) = model.trie.as_mut() {
            match (form, online_form) {
                (ModelForm::Static, ModelForm::Dynamic) => {
                    let frozen = trie.build_static(max_order);
                    write_arena(w, &frozen)?;
                    debug!(
                        dynamic_words = trie.words().len(),
                        static_words = frozen.words().len(),
                        "compacted dynamic trie for static image"
                    );
                }
                (ModelForm::Dynamic, ModelForm::Dynamic) => {
                    trie.compact_input(max_order);
                    write_arena(w, trie)?;
                    write_input(w, trie)?;
                }
                (ModelForm::Static, ModelForm::Static) => {
                    write_arena(w, trie)?;
                }
                (ModelForm::Dynamic, ModelForm::Static) => {
                    // Rejected above.
                    debug_assert!(false);
                }
            }
        }
    }

    if model.alphabet_size == 0 {
        if let Some(table) = &model.ptable {
            table.write_image(w)?;
        }
    }

    debug!(title = %model.title, form = ?form, "wrote model image");
    Ok(())
}
