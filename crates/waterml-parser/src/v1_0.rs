//! Decoder for version 1.0 response documents.
//!
//! In the 1.0 schema the units abbreviation rides on the `units` element
//! as an attribute, and values carry only `dateTime` and `qualifiers`.

use chrono::NaiveDateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use hydro_common::{DataValue, HydroError, HydroResult, Series, Site, Variable};

use crate::{parse_timestamp, parse_value_text};

fn xml_err(e: impl Into<anyhow::Error>) -> HydroError {
    HydroError::parse("malformed version 1.0 document", e)
}

fn attr(e: &BytesStart<'_>, name: &str) -> HydroResult<Option<String>> {
    match e.try_get_attribute(name) {
        Ok(Some(a)) => Ok(Some(a.unescape_value().map_err(xml_err)?.into_owned())),
        Ok(None) => Ok(None),
        Err(e) => Err(xml_err(e)),
    }
}

fn parse_coordinate(text: &str) -> HydroResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|e| HydroError::parse(format!("invalid coordinate '{}'", text), e))
}

pub(crate) fn parse(xml: &[u8]) -> HydroResult<Vec<Series>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut series_list = Vec::new();

    let mut site = Site::new("", "");
    let mut variable = Variable::new("", "");
    let mut values: Vec<DataValue> = Vec::new();
    let mut method: Option<String> = None;
    let mut source: Option<String> = None;

    // Attributes of the <value> element currently awaiting its text node.
    let mut pending_value: Option<(NaiveDateTime, Option<String>)> = None;
    let mut current: Vec<u8> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current = e.name().as_ref().to_vec();
                match current.as_slice() {
                    b"timeSeries" => {
                        site = Site::new("", "");
                        variable = Variable::new("", "");
                        values.clear();
                        method = None;
                        source = None;
                    }
                    b"siteCode" => {
                        if let Some(network) = attr(&e, "network")? {
                            site.network = network;
                        }
                    }
                    b"units" => {
                        if let Some(abbrev) = attr(&e, "unitsAbbreviation")? {
                            variable.units = abbrev;
                        }
                    }
                    b"value" => {
                        let raw = attr(&e, "dateTime")?.ok_or_else(|| {
                            HydroError::parse(
                                "value element missing dateTime attribute",
                                anyhow::anyhow!("dateTime is required"),
                            )
                        })?;
                        pending_value = Some((parse_timestamp(&raw)?, attr(&e, "qualifiers")?));
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(xml_err)?.into_owned();
                match current.as_slice() {
                    b"siteName" => site.name = text,
                    b"siteCode" => site.code = text,
                    b"latitude" => site.latitude = parse_coordinate(&text)?,
                    b"longitude" => site.longitude = parse_coordinate(&text)?,
                    b"elevation_m" => site.elevation_m = text.trim().parse().ok(),
                    b"variableCode" => variable.code = text,
                    b"variableName" => variable.name = text,
                    b"dataType" => variable.data_type = text,
                    b"timeSupport" => variable.time_support = text.trim().parse().ok(),
                    b"methodDescription" => method = Some(text),
                    b"organization" => source = Some(text),
                    b"value" => {
                        if let Some((timestamp, qualifier)) = pending_value.take() {
                            values.push(DataValue {
                                value: parse_value_text(&text)?,
                                timestamp,
                                qualifier,
                            });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"timeSeries" {
                    let mut series = Series::new(site.clone(), variable.clone());
                    series.method = method.take();
                    series.source = source.take();
                    series.values = std::mem::take(&mut values);
                    series_list.push(series);
                }
                current.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(xml_err(e)),
        }
        buf.clear();
    }

    Ok(series_list)
}
