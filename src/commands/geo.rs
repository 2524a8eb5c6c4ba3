use async_trait::async_trait;
use bytes::Bytes;

use crate::command_meta::is_write_command;
use crate::commands::{encode, validate_key};
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::{Error, Result};
use crate::reply::{decode_bulk_opt, decode_integer};
use crate::resp::RespValue;

fn ctx(op: &'static str, key: &str) -> DispatchContext<'_> {
    DispatchContext::new(Some(key), is_write_command(op))
}

const MIN_LONGITUDE: f64 = -180.0;
const MAX_LONGITUDE: f64 = 180.0;
const MIN_LATITUDE: f64 = -85.05112878;
const MAX_LATITUDE: f64 = 85.05112878;

fn validate_coordinate(lon: f64, lat: f64) -> Result<()> {
    if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&lon) {
        return Err(Error::invalid_argument(format!(
            "longitude {} out of range [{}, {}]",
            lon, MIN_LONGITUDE, MAX_LONGITUDE
        )));
    }
    if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&lat) {
        return Err(Error::invalid_argument(format!(
            "latitude {} out of range [{}, {}]",
            lat, MIN_LATITUDE, MAX_LATITUDE
        )));
    }
    Ok(())
}

/// Units accepted by `GEOSEARCH`'s `BYRADIUS`/`BYBOX` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoUnit {
    Meters,
    Kilometers,
    Feet,
    Miles,
}

impl GeoUnit {
    fn as_arg(self) -> &'static [u8] {
        match self {
            GeoUnit::Meters => b"m",
            GeoUnit::Kilometers => b"km",
            GeoUnit::Feet => b"ft",
            GeoUnit::Miles => b"mi",
        }
    }
}

/// Sort order for `GEOSEARCH` results by distance from the search origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoOrder {
    Asc,
    Desc,
}

impl GeoOrder {
    fn as_arg(self) -> &'static [u8] {
        match self {
            GeoOrder::Asc => b"ASC",
            GeoOrder::Desc => b"DESC",
        }
    }
}

/// The center a `FIND_NEIGHBOURS` search radiates from: either an explicit
/// coordinate or an already-stored member.
#[derive(Debug, Clone, Copy)]
pub enum GeoSearchOrigin<'a> {
    FromLonLat(f64, f64),
    FromMember(&'a [u8]),
}

/// Parameters for [`GeoCommands::geosearch`], covering the full
/// `FIND_NEIGHBOURS` surface: radius, unit, result count, and whether to
/// include each match's distance and/or coordinate.
#[derive(Debug, Clone)]
pub struct GeoSearchOptions<'a> {
    pub origin: GeoSearchOrigin<'a>,
    pub radius: f64,
    pub unit: GeoUnit,
    pub count: Option<u64>,
    pub need_coord: bool,
    pub need_dist: bool,
    pub order: Option<GeoOrder>,
}

impl<'a> GeoSearchOptions<'a> {
    pub fn by_coordinate(lon: f64, lat: f64, radius: f64, unit: GeoUnit) -> Self {
        GeoSearchOptions {
            origin: GeoSearchOrigin::FromLonLat(lon, lat),
            radius,
            unit,
            count: None,
            need_coord: false,
            need_dist: false,
            order: None,
        }
    }

    pub fn by_member(member: &'a [u8], radius: f64, unit: GeoUnit) -> Self {
        GeoSearchOptions {
            origin: GeoSearchOrigin::FromMember(member),
            radius,
            unit,
            count: None,
            need_coord: false,
            need_dist: false,
            order: None,
        }
    }
}

/// One `GEOSEARCH` match: always the member, plus its distance and/or
/// coordinate when `GeoSearchOptions::need_dist`/`need_coord` requested them.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoSearchResult {
    pub member: Bytes,
    pub distance: Option<f64>,
    pub coord: Option<(f64, f64)>,
}

#[async_trait]
pub trait GeoCommands: Dispatcher {
    async fn geoadd(&self, key: &str, entries: &[(f64, f64, &[u8])]) -> Result<i64> {
        validate_key(key)?;
        for (lon, lat, _) in entries {
            validate_coordinate(*lon, *lat)?;
        }
        let mut parts: Vec<&[u8]> = vec![b"GEOADD", key.as_bytes()];
        let coord_strs: Vec<(String, String)> =
            entries.iter().map(|(lon, lat, _)| (lon.to_string(), lat.to_string())).collect();
        for ((lon_s, lat_s), (_, _, member)) in coord_strs.iter().zip(entries.iter()) {
            parts.push(lon_s.as_bytes());
            parts.push(lat_s.as_bytes());
            parts.push(member);
        }
        let request = encode(parts);
        decode_integer(self.dispatch("GEOADD", ctx("GEOADD", key), request).await?)
    }

    /// Remove members from the geo index. A geo set is backed by a sorted
    /// set, so removal is `ZREM` under the hood; returns the count actually
    /// removed.
    async fn georemove(&self, key: &str, members: &[&[u8]]) -> Result<i64> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"ZREM", key.as_bytes()];
        parts.extend(members.iter().copied());
        let request = encode(parts);
        decode_integer(self.dispatch("ZREM", ctx("ZREM", key), request).await?)
    }

    async fn geopos(&self, key: &str, members: &[&[u8]]) -> Result<Vec<Option<(f64, f64)>>> {
        validate_key(key)?;
        let mut parts: Vec<&[u8]> = vec![b"GEOPOS", key.as_bytes()];
        parts.extend(members.iter().copied());
        let request = encode(parts);
        let value = self.dispatch("GEOPOS", ctx("GEOPOS", key), request).await?;
        match value {
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Array(None) => Ok(None),
                    RespValue::Array(Some(pair)) if pair.len() == 2 => {
                        let lon = parse_coord(&pair[0])?;
                        let lat = parse_coord(&pair[1])?;
                        Ok(Some((lon, lat)))
                    }
                    other => Err(Error::unexpected(format!("malformed GEOPOS entry: {:?}", other))),
                })
                .collect(),
            RespValue::Array(None) => Ok(Vec::new()),
            other => Err(Error::unexpected(format!("expected array, got {:?}", other))),
        }
    }

    async fn geodist(&self, key: &str, member1: &[u8], member2: &[u8]) -> Result<Option<f64>> {
        validate_key(key)?;
        let request = encode([b"GEODIST".as_slice(), key.as_bytes(), member1, member2]);
        let value = self.dispatch("GEODIST", ctx("GEODIST", key), request).await?;
        match decode_bulk_opt(value.clone()) {
            Ok(None) => Ok(None),
            _ => Ok(Some(crate::reply::decode_float(value)?)),
        }
    }

    /// `FIND_NEIGHBOURS`: members within `options.radius` of either an
    /// explicit coordinate or an already-stored member, with optional
    /// distance/coordinate annotation, result limit, and distance ordering.
    async fn geosearch(&self, key: &str, options: &GeoSearchOptions<'_>) -> Result<Vec<GeoSearchResult>> {
        validate_key(key)?;
        if let GeoSearchOrigin::FromLonLat(lon, lat) = options.origin {
            validate_coordinate(lon, lat)?;
        }

        let lon_s;
        let lat_s;
        let radius_s = options.radius.to_string();
        let count_s;

        let mut parts: Vec<&[u8]> = vec![b"GEOSEARCH", key.as_bytes()];
        match options.origin {
            GeoSearchOrigin::FromLonLat(lon, lat) => {
                lon_s = lon.to_string();
                lat_s = lat.to_string();
                parts.push(b"FROMLONLAT");
                parts.push(lon_s.as_bytes());
                parts.push(lat_s.as_bytes());
            }
            GeoSearchOrigin::FromMember(member) => {
                parts.push(b"FROMMEMBER");
                parts.push(member);
            }
        }
        parts.push(b"BYRADIUS");
        parts.push(radius_s.as_bytes());
        parts.push(options.unit.as_arg());
        if options.need_coord {
            parts.push(b"WITHCOORD");
        }
        if options.need_dist {
            parts.push(b"WITHDIST");
        }
        if let Some(order) = options.order {
            parts.push(order.as_arg());
        }
        if let Some(count) = options.count {
            count_s = count.to_string();
            parts.push(b"COUNT");
            parts.push(count_s.as_bytes());
        }

        let request = encode(parts);
        let value = self.dispatch("GEOSEARCH", ctx("GEOSEARCH", key), request).await?;
        parse_geosearch_reply(value, options.need_dist, options.need_coord)
    }
}

fn parse_geosearch_reply(value: RespValue, need_dist: bool, need_coord: bool) -> Result<Vec<GeoSearchResult>> {
    let items = match value {
        RespValue::Array(Some(items)) => items,
        RespValue::Array(None) => return Ok(Vec::new()),
        other => return Err(Error::unexpected(format!("expected array, got {:?}", other))),
    };

    items
        .into_iter()
        .map(|item| {
            if !need_dist && !need_coord {
                let member = decode_bulk_opt(item)?.ok_or_else(|| Error::unexpected("GEOSEARCH member was nil"))?;
                return Ok(GeoSearchResult { member, distance: None, coord: None });
            }
            let fields = item
                .as_array()
                .ok_or_else(|| Error::unexpected("malformed GEOSEARCH entry"))?;
            let mut idx = 0;
            let member = fields
                .get(idx)
                .and_then(|f| f.as_bulk())
                .map(|b| Bytes::copy_from_slice(b))
                .ok_or_else(|| Error::unexpected("GEOSEARCH entry missing member"))?;
            idx += 1;

            let distance = if need_dist {
                let text = fields
                    .get(idx)
                    .and_then(|f| f.as_bulk())
                    .and_then(|b| std::str::from_utf8(b).ok())
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| Error::unexpected("GEOSEARCH entry missing distance"))?;
                idx += 1;
                Some(text)
            } else {
                None
            };

            let coord = if need_coord {
                match fields.get(idx) {
                    Some(RespValue::Array(Some(pair))) if pair.len() == 2 => {
                        Some((parse_coord(&pair[0])?, parse_coord(&pair[1])?))
                    }
                    other => return Err(Error::unexpected(format!("GEOSEARCH entry missing coordinate: {:?}", other))),
                }
            } else {
                None
            };

            Ok(GeoSearchResult { member, distance, coord })
        })
        .collect()
}

fn parse_coord(value: &RespValue) -> Result<f64> {
    match value {
        RespValue::BulkString(Some(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| Error::unexpected("malformed GEOPOS coordinate")),
        other => Err(Error::unexpected(format!("expected bulk string coordinate, got {:?}", other))),
    }
}

impl<T: Dispatcher + ?Sized> GeoCommands for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockDispatcher(Mutex<Vec<RespValue>>);

    #[async_trait]
    impl Dispatcher for MockDispatcher {
        async fn dispatch(&self, _op: &'static str, _ctx: DispatchContext<'_>, _request: Bytes) -> Result<RespValue> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn geoadd_decodes_integer() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Integer(1)]));
        assert_eq!(mock.geoadd("g", &[(13.361389, 38.115556, b"Palermo")]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn geoadd_rejects_out_of_range_longitude() {
        let mock = MockDispatcher(Mutex::new(vec![]));
        let err = mock.geoadd("g", &[(200.0, 38.0, b"Nowhere")]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn geoadd_rejects_out_of_range_latitude() {
        let mock = MockDispatcher(Mutex::new(vec![]));
        let err = mock.geoadd("g", &[(13.0, 86.0, b"Nowhere")]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn georemove_decodes_integer() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Integer(1)]));
        assert_eq!(mock.georemove("g", &[b"Palermo"]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn geopos_decodes_nil_entry() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Array(Some(vec![RespValue::Array(None)]))]));
        let result = mock.geopos("g", &[b"missing"]).await.unwrap();
        assert_eq!(result, vec![None]);
    }

    #[tokio::test]
    async fn geodist_returns_none_on_nil() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::BulkString(None)]));
        assert_eq!(mock.geodist("g", b"a", b"b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn geosearch_plain_reply_has_no_distance_or_coord() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Array(Some(vec![RespValue::BulkString(Some(
            Bytes::from("Palermo"),
        ))]))]));
        let options = GeoSearchOptions::by_coordinate(15.0, 37.0, 200.0, GeoUnit::Kilometers);
        let results = mock.geosearch("g", &options).await.unwrap();
        assert_eq!(
            results,
            vec![GeoSearchResult { member: Bytes::from("Palermo"), distance: None, coord: None }]
        );
    }

    #[tokio::test]
    async fn geosearch_by_member_with_dist_and_coord() {
        let mock = MockDispatcher(Mutex::new(vec![RespValue::Array(Some(vec![RespValue::Array(Some(vec![
            RespValue::BulkString(Some(Bytes::from("Catania"))),
            RespValue::BulkString(Some(Bytes::from("166.2742"))),
            RespValue::Array(Some(vec![
                RespValue::BulkString(Some(Bytes::from("15.08726"))),
                RespValue::BulkString(Some(Bytes::from("37.50266"))),
            ])),
        ]))]))]));

        let mut options = GeoSearchOptions::by_member(b"Palermo", 200.0, GeoUnit::Kilometers);
        options.need_dist = true;
        options.need_coord = true;
        options.order = Some(GeoOrder::Asc);
        options.count = Some(10);

        let results = mock.geosearch("g", &options).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].member, Bytes::from("Catania"));
        assert_eq!(results[0].distance, Some(166.2742));
        assert_eq!(results[0].coord, Some((15.08726, 37.50266)));
    }
}
