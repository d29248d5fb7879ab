use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use super::{parse_float, FormatRecord, TransparencyDescriptor, TransparencyReport, PARSER_ALPHA_THRESHOLD};

const SHADING_TECHNIQUES: &[&str] = &["phong", "lambert", "blinn", "constant"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DaeRecord {
    pub transparency: Option<f32>,
    pub has_transparent: bool,
    pub blend_mode: Option<String>,
}

impl DaeRecord {
    pub fn is_transparent(&self) -> bool {
        self.has_transparent
            || self
                .blend_mode
                .as_deref()
                .is_some_and(|mode| !mode.eq_ignore_ascii_case("OPAQUE"))
            || self
                .transparency
                .is_some_and(|t| t > 0.0 && t < PARSER_ALPHA_THRESHOLD)
    }
}

/// Resolves every material to its effect and reads the effect's transparency inputs.
pub fn parse(path: &Path) -> TransparencyReport {
    appearance_profiling::profile_function!();

    match std::fs::read(path).with_context(|| format!("Failed to read {}", path.display())) {
        Ok(xml) => parse_xml(&String::from_utf8_lossy(&xml)),
        Err(err) => {
            log::warn!("DAE transparency parse failed: {:#}", err);
            TransparencyReport::default()
        }
    }
}

pub fn parse_xml(xml: &str) -> TransparencyReport {
    let mut materials = vec![];
    if let Err(err) = read_material_effects(xml, &mut materials) {
        log::warn!("Failed to read DAE materials: {:#}", err);
    }

    let mut effects = HashMap::new();
    if let Err(err) = read_effects(xml, &mut effects) {
        log::warn!("Failed to read DAE effects: {:#}", err);
    }

    let mut report = TransparencyReport::default();
    for (material_name, effect_id) in materials {
        match effects.get(&effect_id) {
            Some(record) => report.insert(TransparencyDescriptor::new(
                &material_name,
                FormatRecord::Dae(record.clone()),
            )),
            None => log::debug!(
                "DAE material {} references unknown effect {}.",
                material_name,
                effect_id
            ),
        }
    }
    report
}

fn attribute(element: &BytesStart, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name.as_bytes())
        .and_then(|attr| String::from_utf8(attr.value.to_vec()).ok())
}

fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// First pass: material name to effect id, through `<instance_effect url="#id">`.
fn read_material_effects(xml: &str, materials: &mut Vec<(String, String)>) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current_material: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == b"material" => {
                current_material = attribute(e, "name").or_else(|| attribute(e, "id"));
            }
            Event::End(ref e) if e.local_name().as_ref() == b"material" => {
                current_material = None;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"instance_effect" =>
            {
                if let (Some(material), Some(url)) = (&current_material, attribute(e, "url")) {
                    materials.push((material.clone(), url.trim_start_matches('#').to_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(())
}

#[derive(Default)]
struct EffectScan {
    id: String,
    record: DaeRecord,
    technique: Option<String>,
    seen_technique: bool,
}

/// Second pass: transparency inputs of the first shading technique of every effect.
fn read_effects(xml: &str, effects: &mut HashMap<String, DaeRecord>) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = vec![];
    let mut effect: Option<EffectScan> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let name = local_name(e);
                if name == "effect" {
                    effect = Some(EffectScan {
                        id: attribute(e, "id").unwrap_or_default(),
                        ..Default::default()
                    });
                } else if let Some(effect) = &mut effect {
                    enter_element(effect, &name);
                }
                stack.push(name);
            }
            Event::Empty(ref e) => {
                if let Some(effect) = &mut effect {
                    let name = local_name(e);
                    enter_element(effect, &name);
                    leave_element(effect, &name);
                }
            }
            Event::Text(ref text) => {
                let Some(effect) = &mut effect else {
                    continue;
                };
                let text = text.unescape()?;

                let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());
                match (parent, stack.last().map(String::as_str)) {
                    (Some("transparency"), Some("float")) if effect.technique.is_some() => {
                        effect.record.transparency = parse_float(&text);
                    }
                    (_, Some("blend_mode")) => {
                        effect.record.blend_mode = Some(text.trim().to_owned());
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                if name == "effect" {
                    if let Some(effect) = effect.take() {
                        effects.insert(effect.id, effect.record);
                    }
                } else if let Some(effect) = &mut effect {
                    leave_element(effect, &name);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(())
}

fn enter_element(effect: &mut EffectScan, name: &str) {
    if SHADING_TECHNIQUES.contains(&name) && !effect.seen_technique {
        effect.technique = Some(name.to_owned());
        effect.seen_technique = true;
    } else if name == "transparent" && effect.technique.is_some() {
        effect.record.has_transparent = true;
    }
}

fn leave_element(effect: &mut EffectScan, name: &str) {
    if effect.technique.as_deref() == Some(name) {
        effect.technique = None;
    }
}
