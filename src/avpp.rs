//! The tree of aggregate power plants (AVPPs) and the strategies for building it.
//!
//! The tree is stored as an arena of plants connected by parent-to-child edges. A leaf holds a
//! physical plant and an internal node holds a synthetic aggregate plant standing in for its
//! children. Edge weights record the order of a node's children.
use crate::plant::PowerPlantData;
use anyhow::{Context, Result, ensure};
use log::{debug, info};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use serde_string_enum::DeserializeLabeledStringEnum;

/// Name of the root node in a flat hierarchy
const FLAT_ROOT_NAME: &str = "RootAVPP";
/// Name of the single aggregate below the root in a flat hierarchy
const FLAT_FIRST_NAME: &str = "FirstAVPP";

/// A tree of plants and aggregates
#[derive(Debug, Default)]
pub struct AvppGraph {
    graph: DiGraph<PowerPlantData, usize>,
    root: Option<NodeIndex>,
    creation_depth: u32,
}

impl AvppGraph {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for a physical plant
    pub fn add_leaf(&mut self, plant: PowerPlantData) -> NodeIndex {
        self.graph.add_node(plant)
    }

    /// Add a node for an aggregate of the given children, which keep their order
    pub fn add_aggregate(&mut self, plant: PowerPlantData, children: &[NodeIndex]) -> NodeIndex {
        let node = self.graph.add_node(plant);
        for (order, child) in children.iter().enumerate() {
            self.graph.add_edge(node, *child, order);
        }

        node
    }

    /// Mark a node as the root, recording the depth of the tree as it was built
    pub fn set_root(&mut self, node: NodeIndex, creation_depth: u32) {
        self.root = Some(node);
        self.creation_depth = creation_depth;
    }

    /// The root node, if set
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    /// Whether `node` is the root
    pub fn is_root(&self, node: NodeIndex) -> bool {
        self.root == Some(node)
    }

    /// The maximum recursion depth recorded when the tree was built
    pub fn creation_depth(&self) -> u32 {
        self.creation_depth
    }

    /// The plant held by a node
    pub fn plant(&self, node: NodeIndex) -> &PowerPlantData {
        &self.graph[node]
    }

    /// The plant held by a node, mutably
    pub fn plant_mut(&mut self, node: NodeIndex) -> &mut PowerPlantData {
        &mut self.graph[node]
    }

    /// The children of a node in order
    pub fn children(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (*edge.weight(), edge.target()))
            .collect();
        edges.sort_unstable_by_key(|(order, _)| *order);
        edges.into_iter().map(|(_, child)| child).collect()
    }

    /// The plants held by the children of a node
    pub fn child_plants(&self, node: NodeIndex) -> Vec<&PowerPlantData> {
        self.children(node)
            .into_iter()
            .map(|child| self.plant(child))
            .collect()
    }

    /// Find a node by the ID of its plant
    pub fn find_node(&self, id: &str) -> Result<NodeIndex> {
        self.graph
            .node_indices()
            .find(|node| &*self.graph[*node].id.0 == id)
            .with_context(|| format!("No plant with ID {id} in the tree"))
    }

    /// Whether a node has no children
    pub fn is_leaf(&self, node: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .next()
            .is_none()
    }

    /// The height of a node: zero for leaves, otherwise one more than its tallest child
    pub fn height(&self, node: NodeIndex) -> u32 {
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|child| 1 + self.height(child))
            .max()
            .unwrap_or(0)
    }

    /// The number of physical plants in the tree
    pub fn leaf_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|plant| !plant.is_aggregate)
            .count()
    }

    /// The number of aggregates in the tree
    pub fn aggregate_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|plant| plant.is_aggregate)
            .count()
    }

    /// All nodes below and including the root, with children before their parents
    pub fn post_order(&self) -> Vec<NodeIndex> {
        let Some(root) = self.root else {
            return Vec::new();
        };

        let mut nodes = Vec::with_capacity(self.graph.node_count());
        let mut dfs = DfsPostOrder::new(&self.graph, root);
        while let Some(node) = dfs.next(&self.graph) {
            nodes.push(node);
        }

        nodes
    }

    /// Log the structure of the tree
    pub fn log_summary(&self) {
        if let Some(root) = self.root {
            self.log_node(root, 0);
        }
        info!(
            "Makes a total of {} AVPPs and {} plants",
            self.aggregate_count(),
            self.leaf_count()
        );
    }

    fn log_node(&self, node: NodeIndex, indent: usize) {
        let plant = self.plant(node);
        if plant.is_aggregate {
            debug!("{:indent$}AVPP {}", "", plant.id, indent = indent);
            for child in self.children(node) {
                self.log_node(child, indent + 2);
            }
        } else {
            debug!("{:indent$}Concrete plant: {}", "", plant.id, indent = indent);
        }
    }
}

/// The strategy used to group plants into aggregates
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HierarchyType {
    /// Split plants recursively into groups of roughly equal size
    #[default]
    #[string = "iso_split"]
    IsoSplit,
    /// Like iso-split, but allow more plants per aggregate at deeper levels
    #[string = "cone"]
    Cone,
    /// Group plants into aggregates of fixed size, then group those aggregates recursively
    #[string = "plus"]
    Plus,
    /// A single aggregate below the root containing every plant
    #[string = "flat"]
    Flat,
}

/// Builds AVPP trees from a list of plants
#[derive(Debug)]
pub struct AvppCreator {
    hierarchy: HierarchyType,
    plants_per_avpp: usize,
    avpps_per_avpp: usize,
    avpp_counter: u32,
    max_depth: u32,
}

impl AvppCreator {
    /// Create a new [`AvppCreator`].
    ///
    /// # Arguments
    ///
    /// * `hierarchy` - The strategy for grouping plants
    /// * `plants_per_avpp` - Maximum number of plants per aggregate
    /// * `avpps_per_avpp` - Maximum number of aggregates per aggregate (plus trees only)
    pub fn new(
        hierarchy: HierarchyType,
        plants_per_avpp: usize,
        avpps_per_avpp: usize,
    ) -> Result<Self> {
        ensure!(plants_per_avpp >= 2, "plants_per_avpp must be at least 2");
        if hierarchy == HierarchyType::Plus {
            ensure!(
                avpps_per_avpp >= 2,
                "avpps_per_avpp must be at least 2 for plus trees"
            );
        }

        Ok(Self {
            hierarchy,
            plants_per_avpp,
            avpps_per_avpp,
            avpp_counter: 0,
            max_depth: 0,
        })
    }

    /// Build a tree whose leaves are `plants`, in order
    pub fn create_graph(&mut self, plants: Vec<PowerPlantData>) -> Result<AvppGraph> {
        ensure!(!plants.is_empty(), "Cannot build an AVPP tree without plants");

        self.max_depth = 0;
        let mut graph = AvppGraph::new();
        let leaves: Vec<_> = plants
            .into_iter()
            .map(|plant| graph.add_leaf(plant))
            .collect();

        let root = match self.hierarchy {
            HierarchyType::IsoSplit => {
                self.create_node(&mut graph, &leaves, self.plants_per_avpp, 0, 0)
            }
            HierarchyType::Cone => self.create_node(
                &mut graph,
                &leaves,
                self.plants_per_avpp,
                self.plants_per_avpp - 1,
                0,
            ),
            HierarchyType::Plus => self.create_plus_tree(&mut graph, &leaves),
            HierarchyType::Flat => {
                let first = graph.add_aggregate(
                    PowerPlantData::new_aggregate(FLAT_FIRST_NAME.into()),
                    &leaves,
                );
                self.max_depth = 2;
                graph.add_aggregate(PowerPlantData::new_aggregate(FLAT_ROOT_NAME.into()), &[first])
            }
        };
        graph.set_root(root, self.max_depth);

        Ok(graph)
    }

    /// Add an aggregate with the next running name
    fn add_avpp(&mut self, graph: &mut AvppGraph, children: &[NodeIndex]) -> NodeIndex {
        self.avpp_counter += 1;
        let plant = PowerPlantData::new_aggregate(format!("AVPP_{}", self.avpp_counter).into());
        graph.add_aggregate(plant, children)
    }

    fn create_node(
        &mut self,
        graph: &mut AvppGraph,
        nodes: &[NodeIndex],
        plants_per_avpp: usize,
        plants_per_avpp_prev: usize,
        depth: u32,
    ) -> NodeIndex {
        self.max_depth = self.max_depth.max(depth);
        if plants_per_avpp >= nodes.len() {
            return self.add_avpp(graph, nodes);
        }

        let step = nodes.len() / plants_per_avpp;
        let mut children = Vec::new();
        for chunk in nodes.chunks(step) {
            let child = match self.hierarchy {
                HierarchyType::Cone => self.create_node(
                    graph,
                    chunk,
                    plants_per_avpp + plants_per_avpp_prev,
                    plants_per_avpp,
                    depth + 1,
                ),
                _ => self.create_node(graph, chunk, plants_per_avpp, 0, depth + 1),
            };
            children.push(child);
        }

        self.add_avpp(graph, &children)
    }

    fn create_plus_tree(&mut self, graph: &mut AvppGraph, leaves: &[NodeIndex]) -> NodeIndex {
        let bottom: Vec<_> = leaves
            .chunks(self.plants_per_avpp)
            .map(|chunk| self.add_avpp(graph, chunk))
            .collect();

        self.create_plus_node(graph, &bottom, 1)
    }

    fn create_plus_node(
        &mut self,
        graph: &mut AvppGraph,
        nodes: &[NodeIndex],
        depth: u32,
    ) -> NodeIndex {
        self.max_depth = self.max_depth.max(depth);
        if self.avpps_per_avpp >= nodes.len() {
            return self.add_avpp(graph, nodes);
        }

        let step = nodes.len() / self.avpps_per_avpp;
        let mut children = Vec::new();
        for chunk in nodes.chunks(step) {
            children.push(self.create_plus_node(graph, chunk, depth + 1));
        }

        self.add_avpp(graph, &children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::plants_with_max;
    use rstest::rstest;

    fn create(
        hierarchy: HierarchyType,
        n_plants: usize,
        plants_per_avpp: usize,
        avpps_per_avpp: usize,
    ) -> AvppGraph {
        let plants = plants_with_max(&vec![100.0; n_plants]);
        AvppCreator::new(hierarchy, plants_per_avpp, avpps_per_avpp)
            .unwrap()
            .create_graph(plants)
            .unwrap()
    }

    #[rstest]
    #[case(HierarchyType::IsoSplit, 12, 3, 0, 16, 3, 2)]
    #[case(HierarchyType::IsoSplit, 10, 3, 0, 5, 2, 1)]
    #[case(HierarchyType::IsoSplit, 3, 3, 0, 1, 1, 0)]
    #[case(HierarchyType::Cone, 12, 3, 0, 4, 2, 1)]
    #[case(HierarchyType::Plus, 12, 3, 2, 7, 3, 2)]
    #[case(HierarchyType::Plus, 7, 3, 2, 7, 3, 2)]
    #[case(HierarchyType::Plus, 6, 3, 2, 3, 2, 1)]
    #[case(HierarchyType::Flat, 5, 2, 0, 2, 2, 2)]
    fn test_create_graph(
        #[case] hierarchy: HierarchyType,
        #[case] n_plants: usize,
        #[case] plants_per_avpp: usize,
        #[case] avpps_per_avpp: usize,
        #[case] n_aggregates: usize,
        #[case] height: u32,
        #[case] creation_depth: u32,
    ) {
        let graph = create(hierarchy, n_plants, plants_per_avpp, avpps_per_avpp);
        let root = graph.root().unwrap();

        assert_eq!(graph.leaf_count(), n_plants);
        assert_eq!(graph.aggregate_count(), n_aggregates);
        assert_eq!(graph.height(root), height);
        assert_eq!(graph.creation_depth(), creation_depth);
        assert!(graph.is_root(root));
        assert!(graph.plant(root).is_aggregate);
    }

    #[test]
    fn test_iso_split_structure() {
        let graph = create(HierarchyType::IsoSplit, 12, 3, 0);
        let root = graph.root().unwrap();
        assert_eq!(graph.plant(root).id.to_string(), "AVPP_16");

        let children = graph.children(root);
        assert_eq!(children.len(), 3);
        for child in children {
            assert_eq!(graph.children(child).len(), 4);
        }
    }

    #[test]
    fn test_children_keep_order() {
        let graph = create(HierarchyType::Cone, 12, 3, 0);
        let root = graph.root().unwrap();
        let leaves: Vec<_> = graph
            .children(root)
            .into_iter()
            .flat_map(|child| graph.child_plants(child))
            .map(|plant| plant.id.to_string())
            .collect();
        let expected: Vec<_> = (0..12).map(|i| format!("plant_{i}")).collect();
        assert_eq!(leaves, expected);
    }

    #[test]
    fn test_flat_names() {
        let graph = create(HierarchyType::Flat, 3, 2, 0);
        let root = graph.root().unwrap();
        assert_eq!(graph.plant(root).id.to_string(), FLAT_ROOT_NAME);
        let first = graph.children(root)[0];
        assert_eq!(graph.plant(first).id.to_string(), FLAT_FIRST_NAME);
        assert_eq!(graph.children(first).len(), 3);
    }

    #[test]
    fn test_post_order() {
        let graph = create(HierarchyType::Plus, 12, 3, 2);
        let order = graph.post_order();
        assert_eq!(order.len(), 12 + 7);
        assert_eq!(order.last().copied(), graph.root());

        for (i, node) in order.iter().enumerate() {
            for child in graph.children(*node) {
                let child_pos = order.iter().position(|n| *n == child).unwrap();
                assert!(child_pos < i);
            }
        }
    }

    #[test]
    fn test_find_node() {
        let graph = create(HierarchyType::Flat, 3, 2, 0);
        let node = graph.find_node("plant_1").unwrap();
        assert!(graph.is_leaf(node));
        assert!(graph.find_node("plant_9").is_err());
    }

    #[rstest]
    #[case(HierarchyType::IsoSplit, 1, 0)]
    #[case(HierarchyType::Plus, 3, 1)]
    fn test_creator_invalid(
        #[case] hierarchy: HierarchyType,
        #[case] plants_per_avpp: usize,
        #[case] avpps_per_avpp: usize,
    ) {
        assert!(AvppCreator::new(hierarchy, plants_per_avpp, avpps_per_avpp).is_err());
    }

    #[test]
    fn test_create_graph_no_plants() {
        let mut creator = AvppCreator::new(HierarchyType::IsoSplit, 3, 0).unwrap();
        assert!(creator.create_graph(Vec::new()).is_err());
    }
}
