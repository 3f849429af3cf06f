//! Built-in template bodies.

/// Name of the template every node is rendered with.
pub const DEFAULT_TEMPLATE_NAME: &str = "default";

/// Canonical default body.
///
/// `static_host_map` maps each lighthouse's reachable `ip:port` to its
/// overlay address and skips lighthouses without a public address.
pub const DEFAULT_TEMPLATE: &str = r#"pki:
  ca: {{ ca_cert_path }}
  cert: {{ cert_path }}
  key: {{ key_path }}
static_host_map:
{%- for lh in lighthouses %}
{%- if lh.public_host %}
  "{{ lh.public_host }}": ["{{ lh.subnet_ip }}"]
{%- endif %}
{%- endfor %}
lighthouse:
  am_lighthouse: {{ is_lighthouse }}
  interval: 60
  hosts:
{%- for lh in lighthouses %}
    - "{{ lh.subnet_ip }}"
{%- endfor %}
listen:
  host: 0.0.0.0
  port: {{ listen_port }}
  batch: 64
punchy:
  punch: true
tun:
  dev: nebula{% if device_id %}{{ device_id }}{% endif %}
  mtu: 1300
  unsafe_routes: []
  cipher: aes
  drop_local_broadcast: false
  drop_multicast: false
  disabled: false
  tx_queue: 5000
  ip: {{ subnet_cidr }}
firewall:
  conntrack:
    tcp_timeout: 12m
    udp_timeout: 3m
    default_allow: false
  outbound:
    - port: any
      proto: any
      host: any
  inbound:
    - port: any
      proto: any
      host: any
"#;

/// Earlier default body, keyed by overlay address and emitting an entry for
/// every lighthouse. A stored `default` template whose body equals this
/// verbatim is migrated to [`DEFAULT_TEMPLATE`].
pub const LEGACY_DEFAULT_TEMPLATE: &str = r#"pki:
  ca: {{ ca_cert_path }}
  cert: {{ cert_path }}
  key: {{ key_path }}
static_host_map:
{%- for lh in lighthouses %}
  "{{ lh.subnet_ip }}": ["{{ lh.public_host }}"]
{%- endfor %}
lighthouse:
  am_lighthouse: {{ is_lighthouse }}
  interval: 60
  hosts:
{%- for lh in lighthouses %}
    - "{{ lh.subnet_ip }}"
{%- endfor %}
listen:
  host: 0.0.0.0
  port: {{ listen_port }}
  batch: 64
punchy:
  punch: true
tun:
  dev: nebula{% if device_id %}{{ device_id }}{% endif %}
  mtu: 1300
  unsafe_routes: []
  cipher: aes
  drop_local_broadcast: false
  drop_multicast: false
  disabled: false
  tx_queue: 5000
  ip: {{ subnet_cidr }}
firewall:
  conntrack:
    tcp_timeout: 12m
    udp_timeout: 3m
    default_allow: false
  outbound:
    - port: any
      proto: any
      host: any
  inbound:
    - port: any
      proto: any
      host: any
"#;
