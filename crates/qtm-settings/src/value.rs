//! Shared text parsing and fixed-decimal formatting helpers.
//!
//! Two boolean parsers exist on purpose. Element text historically carries
//! `True`/`False` and nothing else ([`parse_xml_bool`]), while the
//! attribute-driven skeleton and calibration schemas also carry `1`/`0`
//! ([`ParseValue`]). The two sets of accepted tokens must not be unified.

use qtm_xml::Element;

use crate::SettingsError;

/// Strict wire boolean: strip control and whitespace characters, lower-case,
/// accept exactly `true` or `false`.
pub fn parse_xml_bool(text: &str) -> Option<bool> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    match cleaned.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Lenient parsing used by attribute-heavy schemas.
pub trait ParseValue: Sized {
    fn parse_value(text: &str) -> Option<Self>;
}

impl ParseValue for bool {
    fn parse_value(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

macro_rules! parse_value_via_from_str {
    ($($ty:ty),* $(,)?) => {
        $(impl ParseValue for $ty {
            fn parse_value(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }
        })*
    };
}

parse_value_via_from_str!(u8, u32, i32, usize, f32, f64);

/// Pack 8-bit RGB channels as `R | G<<8 | B<<16`.
pub const fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16)
}

/// Split a packed color back into its 8-bit RGB channels.
pub const fn rgb_components(color: u32) -> (u8, u8, u8) {
    (
        (color & 0xff) as u8,
        ((color >> 8) & 0xff) as u8,
        ((color >> 16) & 0xff) as u8,
    )
}

pub(crate) fn fmt_f32(value: f32, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

pub(crate) fn fmt_f64(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

pub(crate) fn fmt_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub(crate) fn required_child<'a>(
    parent: &'a Element,
    name: &str,
) -> Result<&'a Element, SettingsError> {
    parent
        .child(name)
        .ok_or_else(|| SettingsError::MissingElement(name.into()))
}

pub(crate) fn required_text<'a>(parent: &'a Element, name: &str) -> Result<&'a str, SettingsError> {
    parent
        .child_text(name)
        .ok_or_else(|| SettingsError::MissingElement(name.into()))
}

pub(crate) fn required_parsed<T: std::str::FromStr>(
    parent: &Element,
    name: &str,
) -> Result<T, SettingsError> {
    let text = required_text(parent, name)?;
    text.trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue(name.into(), text.into()))
}

pub(crate) fn required_bool(parent: &Element, name: &str) -> Result<bool, SettingsError> {
    let text = required_text(parent, name)?;
    parse_xml_bool(text).ok_or_else(|| SettingsError::InvalidValue(name.into(), text.into()))
}

/// Strict boolean for an optional element: absent is `None`, present but
/// unparseable is an error.
pub(crate) fn optional_bool(parent: &Element, name: &str) -> Result<Option<bool>, SettingsError> {
    match parent.child_text(name) {
        None => Ok(None),
        Some(text) => parse_xml_bool(text)
            .map(Some)
            .ok_or_else(|| SettingsError::InvalidValue(name.into(), text.into())),
    }
}

pub(crate) fn child_f32_or_nan(parent: &Element, name: &str) -> f32 {
    parent.child_parsed(name).unwrap_or(f32::NAN)
}

pub(crate) fn child_f64_or_nan(parent: &Element, name: &str) -> f64 {
    parent.child_parsed(name).unwrap_or(f64::NAN)
}

pub(crate) fn attr_f32_or_nan(elem: &Element, name: &str) -> f32 {
    elem.attribute_parsed(name).unwrap_or(f32::NAN)
}

pub(crate) fn attr_f64_or_nan(elem: &Element, name: &str) -> f64 {
    elem.attribute_parsed(name).unwrap_or(f64::NAN)
}

pub(crate) fn attr_value<T: ParseValue>(elem: &Element, name: &str) -> Option<T> {
    elem.attribute(name).and_then(T::parse_value)
}

pub(crate) fn required_attr<T: ParseValue>(
    elem: &Element,
    name: &str,
) -> Result<T, SettingsError> {
    let raw = elem
        .attribute(name)
        .ok_or_else(|| SettingsError::MissingAttribute(name.into()))?;
    T::parse_value(raw).ok_or_else(|| SettingsError::InvalidValue(name.into(), raw.into()))
}

pub(crate) fn required_attr_text<'a>(
    elem: &'a Element,
    name: &str,
) -> Result<&'a str, SettingsError> {
    elem.attribute(name)
        .ok_or_else(|| SettingsError::MissingAttribute(name.into()))
}

pub(crate) fn push_str(parent: &mut Element, name: &str, value: &str) {
    parent.push(Element::with_text(name, value));
}

pub(crate) fn push_u32(parent: &mut Element, name: &str, value: u32) {
    parent.push(Element::with_text(name, value.to_string()));
}

pub(crate) fn push_i32(parent: &mut Element, name: &str, value: i32) {
    parent.push(Element::with_text(name, value.to_string()));
}

pub(crate) fn push_bool(parent: &mut Element, name: &str, value: bool) {
    parent.push(Element::with_text(name, fmt_bool(value)));
}

/// Emit a fixed-decimal float element, skipping NaN ("not set") values.
pub(crate) fn push_f32(parent: &mut Element, name: &str, value: f32, decimals: usize) {
    if !value.is_nan() {
        parent.push(Element::with_text(name, fmt_f32(value, decimals)));
    }
}

pub(crate) fn push_f64(parent: &mut Element, name: &str, value: f64, decimals: usize) {
    if !value.is_nan() {
        parent.push(Element::with_text(name, fmt_f64(value, decimals)));
    }
}

/// Set a fixed-decimal float attribute, skipping NaN ("not set") values.
pub(crate) fn set_attr_f32(elem: &mut Element, name: &str, value: f32, decimals: usize) {
    if !value.is_nan() {
        elem.set_attribute(name, fmt_f32(value, decimals));
    }
}

pub(crate) fn set_attr_f64(elem: &mut Element, name: &str, value: f64, decimals: usize) {
    if !value.is_nan() {
        elem.set_attribute(name, fmt_f64(value, decimals));
    }
}
