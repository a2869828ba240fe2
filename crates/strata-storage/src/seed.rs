// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default reference data seeded into every backend at initialization.
//!
//! Endpoints seeded here are placeholders until the first successful
//! remote refresh replaces them with the workspace's live listing.

use strata_core::{Domain, Endpoint, EndpointType, Site};

/// Default subject-matter domains.
pub fn default_domains() -> Vec<Domain> {
    fn domain(id: &str, name: &str, description: &str, prompt: &str, icon: &str) -> Domain {
        Domain {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            system_prompt: prompt.to_string(),
            icon: Some(icon.to_string()),
        }
    }

    vec![
        domain(
            "generic",
            "General Assistant",
            "General-purpose AI assistant for Meridian Resources",
            "You are a helpful AI assistant for Meridian Resources, a global mining company. Provide accurate, professional responses.",
            "Bot",
        ),
        domain(
            "mining-ops",
            "Mining Operations",
            "Mining operations, production, and equipment management",
            "You are a mining operations specialist for Meridian Resources. Help with production optimization, equipment management, and operational efficiency.",
            "Pickaxe",
        ),
        domain(
            "geological",
            "Geological Services",
            "Geological analysis, exploration, and resource estimation",
            "You are a geological services expert for Meridian Resources. Assist with geological analysis, exploration planning, and resource estimation.",
            "Mountain",
        ),
        domain(
            "processing",
            "Mineral Processing",
            "Mineral processing and plant optimization",
            "You are a mineral processing specialist for Meridian Resources. Help optimize plant operations, throughput, and recovery rates.",
            "Factory",
        ),
        domain(
            "sustainability",
            "Sustainability & ESG",
            "Environmental, social, and governance initiatives",
            "You are a sustainability and ESG advisor for Meridian Resources. Assist with environmental compliance, social responsibility, and governance reporting.",
            "Leaf",
        ),
        domain(
            "supply-chain",
            "Supply Chain",
            "Supply chain, logistics, and procurement",
            "You are a supply chain specialist for Meridian Resources. Help with logistics optimization, procurement, and vendor management.",
            "Truck",
        ),
        domain(
            "finance",
            "Finance & Analytics",
            "Financial analysis and business analytics",
            "You are a finance and analytics specialist for Meridian Resources. Assist with financial analysis, budgeting, and business intelligence.",
            "BarChart3",
        ),
    ]
}

/// Default operating sites. Read-only reference data.
pub fn default_sites() -> Vec<Site> {
    fn site(id: &str, name: &str, location: &str, kind: &str) -> Site {
        Site {
            id: id.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            kind: kind.to_string(),
        }
    }

    vec![
        site("all-sites", "All Sites", "Global", "Corporate"),
        site("mount-orion", "Mount Orion", "Pilbara, Australia", "Iron Ore"),
        site("redhill", "Red Hill", "Atacama, Chile", "Copper"),
        site("karoo-basin", "Karoo Basin", "Northern Cape, South Africa", "Manganese"),
        site("eastvale", "Eastvale Colliery", "Queensland, Australia", "Metallurgical Coal"),
        site("bluewater", "Bluewater", "Sulawesi, Indonesia", "Nickel"),
        site("santa-elena", "Santa Elena", "Sonora, Mexico", "Silver"),
        site("aurora-basin", "Aurora Basin", "Ontario, Canada", "Gold"),
        site("thornfield", "Thornfield", "Saskatchewan, Canada", "Potash"),
        site("varga", "Varga", "Minas Gerais, Brazil", "Lithium"),
        site("kivu-ridge", "Kivu Ridge", "Rwanda", "Tin"),
        site("glenrock", "Glenrock", "Scotland, UK", "Aggregates"),
    ]
}

/// Default serving endpoints, shown until the first remote refresh.
pub fn default_endpoints() -> Vec<Endpoint> {
    fn endpoint(id: &str, name: &str, description: &str, is_default: bool) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            endpoint_type: EndpointType::Foundation,
            is_default,
            domain_id: None,
        }
    }

    vec![
        endpoint(
            "dbrx-instruct",
            "DBRX Instruct",
            "Hosted foundation model - fast and capable",
            true,
        ),
        endpoint("llama-3-70b", "Llama 3 70B", "Meta's Llama 3 70B model", false),
        endpoint(
            "mixtral-8x7b",
            "Mixtral 8x7B",
            "Mistral AI mixture of experts",
            false,
        ),
    ]
}
