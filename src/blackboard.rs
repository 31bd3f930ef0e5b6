use tokio_util::sync::CancellationToken;

use crate::clause::Clause;
use crate::kernel::unifier::{pre_unify, PreUnifier, DEFAULT_MAX_DEPTH};
use crate::signature::Signature;
use crate::status::Status;

/// Events posted when the board changes. Agents see every event and bid on
/// the work it suggests.
#[derive(Clone, Copy, Debug)]
pub enum Event {
    ClauseAdded(usize),
}

/// An agent's bid on one clause: how much it wants the work.
#[derive(Clone, Copy, Debug)]
pub struct Bid {
    pub clause: usize,
    pub value: u32,
}

/// A scheduled unit of work: a bid together with the agent that made it.
#[derive(Clone, Copy, Debug)]
struct Task {
    agent: usize,
    clause: usize,
    bid: u32,
}

/// What an agent produced from one task.
#[derive(Debug, Default)]
pub struct AgentOutcome {
    /// Clauses to post back to the board.
    pub new_clauses: Vec<Clause>,

    /// A final verdict, which stops the scheduler.
    pub verdict: Option<Status>,
}

/// The shared clause store.
pub struct Blackboard {
    clauses: Vec<Clause>,
}

impl Blackboard {
    pub fn new() -> Blackboard {
        Blackboard { clauses: vec![] }
    }

    fn add(&mut self, clause: Clause) -> Event {
        self.clauses.push(clause);
        Event::ClauseAdded(self.clauses.len() - 1)
    }

    pub fn get(&self, index: usize) -> &Clause {
        &self.clauses[index]
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }
}

impl Default for Blackboard {
    fn default() -> Self {
        Self::new()
    }
}

/// A blackboard agent. `filter` inspects an event and bids, read-only and
/// total; `run` does the actual work on a clause it won.
pub trait Agent {
    fn name(&self) -> &str;

    fn filter(&self, board: &Blackboard, event: &Event) -> Vec<Bid>;

    fn run(&mut self, board: &Blackboard, sig: &mut Signature, clause: usize) -> AgentOutcome;
}

/// The cooperative scheduler: single-threaded, one task per step, highest
/// bid first. Between steps it checks its cancellation token, so dropping
/// work is the client pulling the plug, never a thread to join.
pub struct Scheduler {
    board: Blackboard,
    sig: Signature,
    agents: Vec<Box<dyn Agent>>,
    queue: Vec<Task>,
    token: CancellationToken,
    max_steps: usize,
    pub verbose: bool,
}

impl Scheduler {
    pub fn new(sig: Signature, token: CancellationToken) -> Scheduler {
        Scheduler {
            board: Blackboard::new(),
            sig,
            agents: vec![],
            queue: vec![],
            token,
            max_steps: 1000,
            verbose: false,
        }
    }

    /// A scheduler with the standard agent lineup.
    pub fn with_default_agents(sig: Signature, token: CancellationToken) -> Scheduler {
        let mut scheduler = Scheduler::new(sig, token);
        scheduler.add_agent(Box::new(PreUnificationAgent::default()));
        scheduler
    }

    pub fn add_agent(&mut self, agent: Box<dyn Agent>) {
        self.agents.push(agent);
    }

    pub fn board(&self) -> &Blackboard {
        &self.board
    }

    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    /// Posts a clause and lets every agent bid on the resulting event.
    pub fn add_clause(&mut self, clause: Clause) {
        let event = self.board.add(clause);
        for (index, agent) in self.agents.iter().enumerate() {
            for bid in agent.filter(&self.board, &event) {
                self.queue.push(Task {
                    agent: index,
                    clause: bid.clause,
                    bid: bid.value,
                });
            }
        }
    }

    /// The earliest task with the highest bid, so auctions are
    /// deterministic.
    fn pop_task(&mut self) -> Option<Task> {
        if self.queue.is_empty() {
            return None;
        }
        let mut best = 0;
        for i in 1..self.queue.len() {
            if self.queue[i].bid > self.queue[best].bid {
                best = i;
            }
        }
        Some(self.queue.remove(best))
    }

    /// Drains the task queue. Returns the first agent verdict, or GaveUp
    /// when the auction runs dry with nothing established.
    pub fn run(&mut self) -> Status {
        let mut steps = 0;
        while let Some(task) = self.pop_task() {
            if self.token.is_cancelled() {
                return Status::ResourceOut;
            }
            if steps >= self.max_steps {
                return Status::ResourceOut;
            }
            steps += 1;
            let agent = &mut self.agents[task.agent];
            let outcome = agent.run(&self.board, &mut self.sig, task.clause);
            if self.verbose {
                println!(
                    "step {}: {} on clause {} ({} new, verdict {:?})",
                    steps,
                    agent.name(),
                    self.board.get(task.clause),
                    outcome.new_clauses.len(),
                    outcome.verdict,
                );
            }
            for clause in outcome.new_clauses {
                self.add_clause(clause);
            }
            if let Some(status) = outcome.verdict {
                return status;
            }
        }
        Status::GaveUp
    }
}

/// The bundled reasoning agent: picks unit equations with free variables
/// off the board and pre-unifies their sides. Any pre-unifier at all means
/// the equation is satisfiable by instantiation, so the board is
/// equisatisfiable with the solved form.
pub struct PreUnificationAgent {
    max_depth: usize,
    /// How many pre-unifiers to pull before declaring victory.
    unifier_cap: usize,
}

impl Default for PreUnificationAgent {
    fn default() -> Self {
        PreUnificationAgent {
            max_depth: DEFAULT_MAX_DEPTH,
            unifier_cap: 4,
        }
    }
}

impl PreUnificationAgent {
    pub fn with_max_depth(max_depth: usize) -> PreUnificationAgent {
        PreUnificationAgent {
            max_depth,
            unifier_cap: 4,
        }
    }
}

impl Agent for PreUnificationAgent {
    fn name(&self) -> &str {
        "pre_unification"
    }

    fn filter(&self, board: &Blackboard, event: &Event) -> Vec<Bid> {
        let Event::ClauseAdded(index) = event;
        let clause = board.get(*index);
        match clause.as_unit_equality() {
            Some(literal) if literal.has_free_vars() => {
                // Conjecture-flavored clauses outbid plain axioms.
                let value = match clause.role {
                    crate::syntax::Role::Conjecture | crate::syntax::Role::NegatedConjecture => 2,
                    _ => 1,
                };
                vec![Bid {
                    clause: *index,
                    value,
                }]
            }
            _ => vec![],
        }
    }

    fn run(&mut self, board: &Blackboard, sig: &mut Signature, clause: usize) -> AgentOutcome {
        let Some(literal) = board.get(clause).as_unit_equality() else {
            return AgentOutcome::default();
        };
        let attempt = pre_unify(sig, literal.left.clone(), literal.right.clone());
        match attempt {
            Ok(stream) => {
                let found: Vec<PreUnifier> =
                    stream.max_depth(self.max_depth).take(self.unifier_cap).collect();
                if found.is_empty() {
                    AgentOutcome::default()
                } else {
                    AgentOutcome {
                        new_clauses: vec![],
                        verdict: Some(Status::EquiSatisfiable),
                    }
                }
            }
            Err(error) => AgentOutcome {
                new_clauses: vec![],
                verdict: Some(error.status()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Literal;
    use crate::kernel::term::Term;
    use crate::kernel::types::Type;
    use crate::signature::TYPE_I;
    use crate::syntax::Role;

    fn ity() -> Type {
        Type::base(TYPE_I)
    }

    fn test_sig() -> Signature {
        let mut sig = Signature::new();
        sig.add_uninterpreted("c", ity()).unwrap();
        sig.add_uninterpreted("d", ity()).unwrap();
        sig
    }

    fn sym(sig: &Signature, name: &str) -> Term {
        Term::symbol(sig.key_of(name).unwrap())
    }

    #[test]
    fn test_unifiable_equation_is_equisatisfiable() {
        let sig = test_sig();
        let clause = Clause::new(
            "goal",
            Role::Conjecture,
            vec![Literal::equals(Term::bound(ity(), 1), sym(&sig, "c"))],
        );
        let mut scheduler =
            Scheduler::with_default_agents(sig, CancellationToken::new());
        scheduler.add_clause(clause);
        assert_eq!(scheduler.run(), Status::EquiSatisfiable);
    }

    #[test]
    fn test_ground_clause_attracts_no_bids() {
        let sig = test_sig();
        let clause = Clause::new(
            "ax",
            Role::Axiom,
            vec![Literal::equals(sym(&sig, "c"), sym(&sig, "d"))],
        );
        let mut scheduler =
            Scheduler::with_default_agents(sig, CancellationToken::new());
        scheduler.add_clause(clause);
        assert_eq!(scheduler.run(), Status::GaveUp);
    }

    #[test]
    fn test_cancellation_stops_the_auction() {
        let sig = test_sig();
        let clause = Clause::new(
            "goal",
            Role::Conjecture,
            vec![Literal::equals(Term::bound(ity(), 1), sym(&sig, "c"))],
        );
        let token = CancellationToken::new();
        token.cancel();
        let mut scheduler = Scheduler::with_default_agents(sig, token);
        scheduler.add_clause(clause);
        assert_eq!(scheduler.run(), Status::ResourceOut);
    }

    #[test]
    fn test_conjectures_win_the_auction() {
        let sig = test_sig();
        let axiom = Clause::new(
            "ax",
            Role::Axiom,
            vec![Literal::equals(Term::bound(ity(), 1), sym(&sig, "d"))],
        );
        let goal = Clause::new(
            "goal",
            Role::NegatedConjecture,
            vec![Literal::equals(Term::bound(ity(), 1), sym(&sig, "c"))],
        );
        let mut scheduler =
            Scheduler::with_default_agents(sig, CancellationToken::new());
        scheduler.add_clause(axiom);
        scheduler.add_clause(goal);
        // Both bids are pending; the conjecture's higher bid runs first and
        // settles the outcome.
        assert_eq!(scheduler.run(), Status::EquiSatisfiable);
    }
}
