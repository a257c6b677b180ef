use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use aerolens_core::SpecialistDomain;

/// One operation from the gateway's catalog, as offered to a worker's
/// reasoning loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Write operations against the backing graph. The catalog records the
    /// distinction; idempotence remains the store's concern.
    pub mutating: bool,
}

/// The fixed tool subset one specialist domain is permitted to call. Tool
/// names carry the domain namespace, so a worker can never be offered (or
/// slip through) another domain's operations.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCatalog {
    domain: SpecialistDomain,
    specs: Vec<ToolSpec>,
}

pub fn qualified_name(domain: SpecialistDomain, operation: &str) -> String {
    format!("{}.{operation}", domain.as_str())
}

impl ToolCatalog {
    pub fn for_domain(domain: SpecialistDomain) -> Self {
        let scope = match domain {
            SpecialistDomain::Maintenance => {
                "maintenance events, components, sensors, readings, and aircraft systems"
            }
            SpecialistDomain::Operations => {
                "flights, delays, routes, airports, and operators"
            }
        };

        let specs = vec![
            ToolSpec {
                name: qualified_name(domain, "get_schema"),
                description: format!(
                    "Return the node labels, relationship types, and properties of the fleet \
                     graph visible to the {} domain ({scope}).",
                    domain.as_str()
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
                mutating: false,
            },
            ToolSpec {
                name: qualified_name(domain, "run_cypher"),
                description: format!(
                    "Execute a read-only Cypher query over {scope}. Row-returning queries must \
                     include a LIMIT clause."
                ),
                input_schema: cypher_input_schema(),
                mutating: false,
            },
            ToolSpec {
                name: qualified_name(domain, "write_cypher"),
                description: format!(
                    "Execute a Cypher mutation over {scope}, for example annotating an event or \
                     recording a disposition."
                ),
                input_schema: cypher_input_schema(),
                mutating: true,
            },
        ];

        Self { domain, specs }
    }

    pub fn domain(&self) -> SpecialistDomain {
        self.domain
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|spec| spec.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }
}

fn cypher_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Cypher statement to execute"
            },
            "parameters": {
                "type": "object",
                "description": "Optional named query parameters"
            }
        },
        "required": ["query"]
    })
}
