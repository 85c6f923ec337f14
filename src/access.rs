use crate::catalog::WorldEntity;
use std::net::IpAddr;

/// Name of the cookie a remote operator sets to the management key.
pub const MANAGEMENT_COOKIE: &str = "MANAGEMENTKEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// The host operator: sees every world and may change things.
    Management,
    /// Anyone else: sees public maps, read only.
    Public,
}

impl Viewer {
    pub fn may_mutate(self) -> bool {
        matches!(self, Self::Management)
    }
    pub fn can_view(self, entity: &WorldEntity) -> bool {
        match self {
            Self::Management => true,
            Self::Public => entity.has_rendered_map && entity.is_public,
        }
    }
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(v6.is_loopback(), |v4| v4.is_loopback()),
    }
}

/// The address a request really came from. `X-Forwarded-For` is only
/// believed when the connection itself is local, i.e. from a reverse proxy on
/// the same host; anyone else could claim to be 127.0.0.1.
pub fn client_addr(peer: Option<IpAddr>, forwarded_for: Option<&str>) -> Option<IpAddr> {
    let forwarded = forwarded_for
        .and_then(|header| header.split(',').next())
        .and_then(|first| first.trim().parse().ok());
    match (peer, forwarded) {
        (Some(peer), Some(forwarded)) if is_loopback(peer) => Some(forwarded),
        (peer, _) => peer,
    }
}

pub fn authorize(
    client: Option<IpAddr>,
    cookie: Option<&str>,
    management_key: Option<&str>,
) -> Viewer {
    let local = client.map_or(false, is_loopback);
    let keyed = match (cookie, management_key) {
        (Some(given), Some(key)) => !key.is_empty() && given == key,
        _ => false,
    };
    if local || keyed {
        Viewer::Management
    } else {
        Viewer::Public
    }
}

/// Controls offered next to a listed entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affordances {
    pub create: bool,
    pub delete: bool,
    pub toggle_visibility: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<'a> {
    pub entity: &'a WorldEntity,
    pub affordances: Affordances,
}

/// What `viewer` gets to see of the list, and what they may do to each row.
pub fn filter(entities: &[WorldEntity], viewer: Viewer) -> Vec<Row<'_>> {
    entities
        .iter()
        .filter(|e| viewer.can_view(e))
        .map(|entity| {
            let affordances = if viewer.may_mutate() {
                Affordances {
                    create: entity.is_source_world_present,
                    delete: entity.has_rendered_map,
                    toggle_visibility: entity.has_rendered_map,
                }
            } else {
                Affordances::default()
            };
            Row { entity, affordances }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DetailLevel;

    fn entity(
        id: &str,
        has_rendered_map: bool,
        is_source_world_present: bool,
        is_public: bool,
    ) -> WorldEntity {
        WorldEntity {
            id: id.into(),
            display_name: id.into(),
            source_modified_at: None,
            sort_key: 0,
            map_modified_at: None,
            has_rendered_map,
            is_source_world_present,
            render_detail_level: DetailLevel::AllDetails,
            is_public,
        }
    }

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn loopback_is_management() {
        for addr in ["127.0.0.1", "::1", "::ffff:127.0.0.1"] {
            assert_eq!(authorize(ip(addr), None, None), Viewer::Management, "{addr}");
        }
        assert_eq!(authorize(ip("192.168.1.20"), None, None), Viewer::Public);
        assert_eq!(authorize(None, None, None), Viewer::Public);
    }

    #[test]
    fn management_key_cookie() {
        let remote = ip("203.0.113.9");
        assert_eq!(authorize(remote, Some("s3cret"), Some("s3cret")), Viewer::Management);
        assert_eq!(authorize(remote, Some("guess"), Some("s3cret")), Viewer::Public);
        assert_eq!(authorize(remote, Some("anything"), None), Viewer::Public);
        assert_eq!(authorize(remote, Some(""), Some("")), Viewer::Public);
    }

    #[test]
    fn forwarded_for_only_from_local_proxy() {
        let proxied = client_addr(ip("127.0.0.1"), Some("198.51.100.7, 10.0.0.1"));
        assert_eq!(proxied, ip("198.51.100.7"));
        assert_eq!(authorize(proxied, None, None), Viewer::Public);

        let spoofed = client_addr(ip("198.51.100.7"), Some("127.0.0.1"));
        assert_eq!(authorize(spoofed, None, None), Viewer::Public);

        assert_eq!(client_addr(ip("127.0.0.1"), Some("garbage")), ip("127.0.0.1"));
        assert_eq!(client_addr(ip("::1"), None), ip("::1"));
    }

    #[test]
    fn management_sees_everything_with_matching_controls() {
        let list = [
            entity("unrendered", false, true, true),
            entity("private", true, true, false),
            entity("orphan", true, false, true),
        ];
        let rows = filter(&list, Viewer::Management);
        assert_eq!(rows.len(), 3);
        let controls = |create, delete, toggle_visibility| Affordances {
            create,
            delete,
            toggle_visibility,
        };
        assert_eq!(rows[0].affordances, controls(true, false, false));
        assert_eq!(rows[1].affordances, controls(true, true, true));
        assert_eq!(rows[2].affordances, controls(false, true, true));
    }

    #[test]
    fn public_sees_public_maps_only() {
        let list = [
            entity("unrendered", false, true, true),
            entity("private", true, true, false),
            entity("public", true, true, true),
            entity("public-orphan", true, false, true),
        ];
        let rows = filter(&list, Viewer::Public);
        let ids: Vec<_> = rows.iter().map(|r| r.entity.id.as_str()).collect();
        assert_eq!(ids, ["public", "public-orphan"]);
        for row in rows {
            assert!(row.entity.has_rendered_map && row.entity.is_public);
            assert_eq!(row.affordances, Affordances::default());
        }
    }
}
