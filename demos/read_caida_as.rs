use path_verify::{RelType, RelationshipGraph};

fn main() {
    let topo = RelationshipGraph::from_caida_file("20231201.as-rel.txt.bz2").unwrap();

    println!("Number of ases: {}", topo.graph.node_count());
    println!("Number of relationships: {}", topo.graph.edge_count());

    match topo.relation(3356, 15169) {
        Some(RelType::ProviderToCustomer) => println!("3356 is a provider of 15169"),
        Some(rel) => println!("3356 -> 15169: {:?}", rel),
        None => println!("no known link between 3356 and 15169"),
    }
}
