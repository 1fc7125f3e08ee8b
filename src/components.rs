/// Connected components of an undirected graph over `0..len`.
///
/// Vertices without edges come back as one-element components. Components are
/// ordered by their smallest vertex and list vertices in depth-first visit
/// order. Edge endpoints must be `< len`.
pub fn connected_components(edges: &[(usize, usize)], len: usize) -> Vec<Vec<usize>> {
    let mut adjacent = vec![Vec::new(); len];
    for &(a, b) in edges {
        adjacent[a].push(b);
        adjacent[b].push(a);
    }

    let mut visited = vec![false; len];
    let mut components = Vec::new();
    let mut stack = Vec::new();
    for start in 0..len {
        if visited[start] {
            continue;
        }
        let mut component = Vec::new();
        stack.push(start);
        while let Some(vertex) = stack.pop() {
            if visited[vertex] {
                continue;
            }
            visited[vertex] = true;
            component.push(vertex);
            stack.extend(adjacent[vertex].iter().rev().filter(|it| !visited[**it]));
        }
        components.push(component);
    }
    components
}
