//! The GA operators: initialization, the five mutator families, and
//! one-point crossover with reference repair.

use itertools::Itertools;

use crate::{
    dist::{Cdf, Domain},
    flow::Flow,
    quantities::{seconds, Float, TimeSpan},
    translator::Net,
    util::rand::Rng,
};

use super::Genome;

/// Fixed generation bounds for fresh genomes.
const MAX_NETS: usize = 10;
const MAX_NODES: usize = 100;
const MAX_FLOWS: usize = 10;
const HORIZON_LIMIT: Float = 100.;

/// Builds a fresh random genome within the generation bounds.
#[must_use]
pub fn initialize(rng: &mut Rng) -> Genome {
    let nets = (0..1 + rng.index(MAX_NETS))
        .map(|_| Net::random(rng))
        .collect_vec();
    let nodes = (0..1 + rng.index(MAX_NODES))
        .map(|_| rng.index(nets.len()))
        .collect_vec();
    let flows = (0..1 + rng.index(MAX_FLOWS))
        .map(|_| Flow::random(rng.index(nodes.len()), rng.index(nodes.len()), rng))
        .collect_vec();
    let genome = Genome {
        nets,
        nodes,
        flows,
        flow_count: Cdf::random(Domain::FLOW_COUNT, rng),
        horizon: random_horizon(rng),
    };
    genome
        .validate()
        .expect("a freshly initialized genome satisfies its invariants");
    genome
}

fn random_horizon(rng: &mut Rng) -> TimeSpan {
    seconds(rng.unit() * HORIZON_LIMIT)
}

/// Applies exactly one mutation, drawn uniformly from the five operator
/// families: nets, nodes, the observation horizon, the flow-count
/// distribution, and the flows themselves.
pub fn mutate(genome: &mut Genome, rng: &mut Rng) {
    match rng.index(5) {
        0 => mutate_nets(genome, rng),
        1 => mutate_nodes(genome, rng),
        2 => mutate_horizon(genome, rng),
        3 => genome.flow_count.mutate(rng),
        _ => mutate_flows(genome, rng),
    }
    genome
        .validate()
        .expect("mutation preserves the genome invariants");
}

/// Reshapes, appends, or deletes a net. The last net cannot be deleted
/// directly; deletion cascades through the nodes on the net and their flows.
fn mutate_nets(genome: &mut Genome, rng: &mut Rng) {
    if genome.nets.is_empty() {
        genome.nets.push(Net::random(rng));
        return;
    }
    let arms = if genome.nets.len() == 1 { 1 } else { 2 };
    let choice = rng.index(genome.nets.len() + arms);
    if choice < genome.nets.len() {
        if rng.coin() {
            genome.nets[choice].randomize_mask(rng);
        } else {
            genome.nets[choice].randomize_side(rng);
        }
    } else if choice == genome.nets.len() {
        genome.nets.push(Net::random(rng));
    } else {
        delete_net(genome, rng.index(genome.nets.len()));
    }
}

/// Moves a node to another net, appends a node, or deletes one (cascading
/// through the flows that reference it). The last node cannot be deleted.
fn mutate_nodes(genome: &mut Genome, rng: &mut Rng) {
    if genome.nets.is_empty() {
        return;
    }
    if genome.nodes.is_empty() {
        genome.nodes.push(rng.index(genome.nets.len()));
        return;
    }
    let arms = if genome.nodes.len() == 1 { 1 } else { 2 };
    let choice = rng.index(genome.nodes.len() + arms);
    if choice < genome.nodes.len() {
        // reassignment needs a second net to move to
        if genome.nets.len() > 1 {
            let old = genome.nodes[choice];
            while genome.nodes[choice] == old {
                genome.nodes[choice] = rng.index(genome.nets.len());
            }
        }
    } else if choice == genome.nodes.len() {
        genome.nodes.push(rng.index(genome.nets.len()));
    } else {
        delete_node(genome, rng.index(genome.nodes.len()));
    }
}

/// Resamples the observation horizon until it differs from the old value.
fn mutate_horizon(genome: &mut Genome, rng: &mut Rng) {
    let old = genome.horizon;
    while genome.horizon == old {
        genome.horizon = random_horizon(rng);
    }
}

/// Mutates an existing flow, appends a random one, or deletes one. The last
/// flow cannot be deleted.
fn mutate_flows(genome: &mut Genome, rng: &mut Rng) {
    if genome.nodes.is_empty() {
        return;
    }
    let choice = rng.index(genome.flows.len() + 2);
    if choice < genome.flows.len() {
        genome.flows[choice].mutate(rng);
    } else if choice == genome.flows.len() {
        let node1 = rng.index(genome.nodes.len());
        let node2 = rng.index(genome.nodes.len());
        genome.flows.push(Flow::random(node1, node2, rng));
    } else if genome.flows.len() > 1 {
        let doomed = rng.index(genome.flows.len());
        genome.flows.remove(doomed);
    }
}

/// Removes a node: flows touching it are dropped, surviving flows' node
/// indices are shifted down, and nets left without nodes are pruned.
pub(crate) fn delete_node(genome: &mut Genome, node: usize) {
    remove_node(genome, node);
    prune_nets(genome);
}

/// Removes a net by cascading: every node on it is removed (taking its flows
/// along), then unreferenced nets are pruned, which drops the net itself.
pub(crate) fn delete_net(genome: &mut Genome, net: usize) {
    let doomed = genome.nodes.iter().positions(|&n| n == net).collect_vec();
    for &node in doomed.iter().rev() {
        remove_node(genome, node);
    }
    prune_nets(genome);
}

fn remove_node(genome: &mut Genome, node: usize) {
    genome
        .flows
        .retain(|flow| flow.node1() != node && flow.node2() != node);
    for flow in &mut genome.flows {
        let params = flow.params_mut();
        if params.node1 > node {
            params.node1 -= 1;
        }
        if params.node2 > node {
            params.node2 -= 1;
        }
    }
    genome.nodes.remove(node);
}

/// Drops every net no node references, renumbering the survivors densely.
fn prune_nets(genome: &mut Genome) {
    let used = (0..genome.nets.len())
        .map(|net| genome.nodes.contains(&net))
        .collect_vec();
    if used.iter().all(|&u| u) {
        return;
    }
    let mut remap = vec![usize::MAX; genome.nets.len()];
    let mut kept = 0;
    for (net, &keep) in used.iter().enumerate() {
        if keep {
            remap[net] = kept;
            kept += 1;
        }
    }
    genome.nets = genome
        .nets
        .iter()
        .enumerate()
        .filter_map(|(net, &descriptor)| used[net].then_some(descriptor))
        .collect();
    for node in &mut genome.nodes {
        *node = remap[*node];
    }
}

/// One-point crossover producing two children.
///
/// Each child's flow list splices the parents at a common point; the flows'
/// node references are then re-interned against the contributing parent into
/// fresh dense node and net tables, so both children satisfy the genome
/// invariants without duplicating entries that collide by index.
#[must_use]
pub fn crossover(mom: &Genome, dad: &Genome, rng: &mut Rng) -> (Genome, Genome) {
    let mut sister = mom.clone();
    let mut brother = dad.clone();
    if rng.coin() {
        std::mem::swap(&mut sister.flow_count, &mut brother.flow_count);
    }
    if rng.coin() {
        std::mem::swap(&mut sister.horizon, &mut brother.horizon);
    }

    let shorter = mom.flows.len().min(dad.flows.len());
    let cross = if shorter == 0 { 0 } else { rng.index(shorter) };

    let (nets, nodes, flows) = splice(mom, dad, cross);
    sister.nets = nets;
    sister.nodes = nodes;
    sister.flows = flows;

    let (nets, nodes, flows) = splice(dad, mom, cross);
    brother.nets = nets;
    brother.nodes = nodes;
    brother.flows = flows;

    sister
        .validate()
        .expect("crossover preserves the genome invariants");
    brother
        .validate()
        .expect("crossover preserves the genome invariants");
    (sister, brother)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    First,
    Second,
}

/// Builds one child's tables: flows `first[..cross] + second[cross..]`, with
/// each `(parent node, origin)` pair interned into a dense child node table
/// and the nets those nodes live on interned alongside.
fn splice(first: &Genome, second: &Genome, cross: usize) -> (Vec<Net>, Vec<usize>, Vec<Flow>) {
    let mut flows = first.flows[..cross]
        .iter()
        .chain(&second.flows[cross..])
        .cloned()
        .collect_vec();

    let mut node_table: Vec<(usize, Origin)> = Vec::new();
    for (i, flow) in flows.iter_mut().enumerate() {
        let origin = if i < cross {
            Origin::First
        } else {
            Origin::Second
        };
        let params = flow.params_mut();
        params.node1 = intern(&mut node_table, (params.node1, origin));
        params.node2 = intern(&mut node_table, (params.node2, origin));
    }

    let mut net_table: Vec<(usize, Origin)> = Vec::new();
    let mut nets = Vec::new();
    let mut nodes = Vec::new();
    for &(node, origin) in &node_table {
        let parent = match origin {
            Origin::First => first,
            Origin::Second => second,
        };
        let net = parent.nodes[node];
        let interned = intern(&mut net_table, (net, origin));
        if interned == nets.len() {
            nets.push(parent.nets[net]);
        }
        nodes.push(interned);
    }
    (nets, nodes, flows)
}

fn intern(table: &mut Vec<(usize, Origin)>, entry: (usize, Origin)) -> usize {
    table.iter().position(|&seen| seen == entry).unwrap_or_else(|| {
        table.push(entry);
        table.len() - 1
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{crossover, delete_net, delete_node, initialize, mutate, splice};
    use crate::{
        dist::{Cdf, Domain},
        flow::Flow,
        genome::Genome,
        quantities::seconds,
        translator::{Net, Side},
        util::rand::Rng,
    };

    fn genome_with(
        nets: Vec<Net>,
        nodes: Vec<usize>,
        flows: Vec<Flow>,
        rng: &mut Rng,
    ) -> Genome {
        Genome::new(
            nets,
            nodes,
            flows,
            Cdf::random(Domain::FLOW_COUNT, rng),
            seconds(10.),
        )
        .unwrap()
    }

    fn net(mask: u8, side: Side) -> Net {
        Net::new(mask, side).unwrap()
    }

    #[test]
    fn initialization_respects_the_generation_bounds() {
        let mut rng = Rng::from_seed(30);
        for _ in 0..20 {
            let genome = initialize(&mut rng);
            assert!((1..=10).contains(&genome.nets.len()));
            assert!((1..=100).contains(&genome.nodes.len()));
            assert!((1..=10).contains(&genome.flows.len()));
            assert!(genome.horizon < seconds(100.));
            assert!(genome.validate().is_ok());
        }
    }

    #[test]
    fn mutation_preserves_the_invariants() {
        let mut rng = Rng::from_seed(31);
        let mut genome = initialize(&mut rng);
        for _ in 0..300 {
            mutate(&mut genome, &mut rng);
            assert!(genome.validate().is_ok());
        }
    }

    #[test]
    fn deleting_a_node_remaps_the_surviving_flows() {
        let mut rng = Rng::from_seed(32);
        let mut genome = genome_with(
            vec![net(8, Side::Left), net(16, Side::Right)],
            vec![0, 1, 1],
            vec![Flow::random(0, 2, &mut rng), Flow::random(1, 1, &mut rng)],
            &mut rng,
        );
        delete_node(&mut genome, 1);
        assert_eq!(genome.nodes, vec![0, 1]);
        assert_eq!(genome.flows.len(), 1);
        assert_eq!(genome.flows[0].node1(), 0);
        assert_eq!(genome.flows[0].node2(), 1);
        assert!(genome.validate().is_ok());
    }

    #[test]
    fn deleting_a_node_prunes_orphaned_nets() {
        let mut rng = Rng::from_seed(33);
        let mut genome = genome_with(
            vec![net(8, Side::Left), net(16, Side::Right)],
            vec![0, 1],
            vec![Flow::random(0, 0, &mut rng)],
            &mut rng,
        );
        delete_node(&mut genome, 1);
        assert_eq!(genome.nets.len(), 1);
        assert_eq!(genome.nets[0].mask(), 8);
        assert_eq!(genome.nodes, vec![0]);
        assert_eq!(genome.flows.len(), 1);
        assert!(genome.validate().is_ok());
    }

    #[test]
    fn deleting_a_net_cascades_through_nodes_and_flows() {
        let mut rng = Rng::from_seed(34);
        let mut genome = genome_with(
            vec![net(8, Side::Left), net(16, Side::Right)],
            vec![0, 1, 0],
            vec![
                Flow::random(1, 1, &mut rng),
                Flow::random(0, 1, &mut rng),
                Flow::random(2, 1, &mut rng),
            ],
            &mut rng,
        );
        delete_net(&mut genome, 0);
        // nodes 0 and 2 lived on net 0; only the flow between surviving
        // nodes remains, renumbered
        assert_eq!(genome.nets.len(), 1);
        assert_eq!(genome.nets[0].mask(), 16);
        assert_eq!(genome.nodes, vec![0]);
        assert_eq!(genome.flows.len(), 1);
        assert_eq!(genome.flows[0].node1(), 0);
        assert_eq!(genome.flows[0].node2(), 0);
        assert!(genome.validate().is_ok());
    }

    #[test]
    fn splicing_interns_parent_references_densely() {
        let mut rng = Rng::from_seed(35);
        let mom = genome_with(
            vec![net(8, Side::Left)],
            vec![0, 0],
            vec![Flow::random(0, 1, &mut rng), Flow::random(1, 0, &mut rng)],
            &mut rng,
        );
        let dad = genome_with(
            vec![net(16, Side::Left), net(24, Side::Right)],
            vec![0, 1],
            vec![Flow::random(1, 1, &mut rng), Flow::random(0, 1, &mut rng)],
            &mut rng,
        );

        let (nets, nodes, flows) = splice(&mom, &dad, 1);
        // mom's flow 0 keeps its nodes, re-interned in first-seen order;
        // dad's flow 1 brings (0, 1) in as fresh entries
        assert_eq!(flows.len(), 2);
        assert_eq!((flows[0].node1(), flows[0].node2()), (0, 1));
        assert_eq!((flows[1].node1(), flows[1].node2()), (2, 3));
        // nodes 0 and 1 come from mom (both on her /8), 2 and 3 from dad
        assert_eq!(nodes, vec![0, 0, 1, 2]);
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[0].mask(), 8);
        assert_eq!(nets[1].mask(), 16);
        assert_eq!(nets[2].mask(), 24);
    }

    #[test]
    fn crossover_children_satisfy_the_invariants() {
        let mut rng = Rng::from_seed(36);
        for _ in 0..20 {
            let mom = initialize(&mut rng);
            let dad = initialize(&mut rng);
            let (sister, brother) = crossover(&mom, &dad, &mut rng);
            assert!(sister.validate().is_ok());
            assert!(brother.validate().is_ok());
            assert!(!sister.flows.is_empty());
            assert!(!brother.flows.is_empty());
        }
    }
}
