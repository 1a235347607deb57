use blog_service::models::{ArticleEnvelope, ArticleListResponse, CommentEnvelope, CommentListResponse, MessageResponse};
use blog_service::user_models::UserEnvelope;
use chrono::Local;
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

#[derive(Parser)]
#[command(name = "blog")]
#[command(about = "A CLI client for the blog service", long_about = None)]
struct Cli {
    #[arg(long, env = "BLOG_API_URL", default_value = "http://localhost:4141", help = "Base URL of the service")]
    api_url: String,

    #[arg(long, env = "BLOG_TOKEN", help = "Bearer token returned by register or login")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new account")]
    Register {
        #[arg(long)]
        firstname: String,
        #[arg(long)]
        lastname: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },

    #[command(about = "Log in and print your token")]
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },

    #[command(about = "Show the account that owns the token")]
    Whoami,

    #[command(about = "List all articles")]
    Articles,

    #[command(about = "Show one article with its comments")]
    Show { slug: String },

    #[command(about = "Publish an article")]
    Post {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "")]
        body: String,
        #[arg(long, help = "Tags (comma-separated)")]
        tags: Option<String>,
    },

    #[command(about = "Delete one of your articles")]
    Delete { slug: String },

    #[command(about = "Comment on an article")]
    Comment {
        slug: String,
        #[arg(short, long)]
        body: String,
    },

    #[command(about = "List comments on an article")]
    Comments { slug: String },

    #[command(about = "Delete one of your comments")]
    Uncomment { slug: String, id: String },
}

struct Client {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl Client {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> anyhow::Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("this command needs --token or BLOG_TOKEN"))?;
        Ok(request.bearer_auth(token))
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let message = response
            .json::<MessageResponse>()
            .await
            .map(|m| m.message)
            .unwrap_or_else(|_| "no details".to_string());
        anyhow::bail!("request failed ({status}): {message}");
    }
    Ok(response.json().await?)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = Client {
        http: reqwest::Client::new(),
        api_url: cli.api_url,
        token: cli.token,
    };

    if let Err(e) = run_command(&client, cli.command).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(client: &Client, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Register {
            firstname,
            lastname,
            username,
            email,
            password,
        } => {
            let response = client
                .http
                .post(client.url("/users"))
                .json(&json!({
                    "firstname": firstname,
                    "lastname": lastname,
                    "username": username,
                    "email": email,
                    "password": password,
                }))
                .send()
                .await?;
            let result: UserEnvelope = parse(response).await?;
            println!("✅ Registered {}", result.user.username);
            println!("   Token: {}", result.user.token);
        }
        Commands::Login { email, password } => {
            let response = client
                .http
                .post(client.url("/users/login"))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            let result: UserEnvelope = parse(response).await?;
            println!("✅ Logged in as {}", result.user.username);
            println!("   Token: {}", result.user.token);
        }
        Commands::Whoami => {
            let request = client.authorized(client.http.get(client.url("/users/user")))?;
            let result: UserEnvelope = parse(request.send().await?).await?;
            println!(
                "👤 {} ({} {}) <{}>",
                result.user.username, result.user.firstname, result.user.lastname, result.user.email
            );
        }
        Commands::Articles => {
            let response = client.http.get(client.url("/articles")).send().await?;
            let result: ArticleListResponse = parse(response).await?;
            print_articles(&result);
        }
        Commands::Show { slug } => {
            let response = client.http.get(client.url(&format!("/articles/{slug}"))).send().await?;
            let result: ArticleListResponse = parse(response).await?;
            let Some(article) = result.articles.first() else {
                println!("📭 No article with slug {slug}.");
                return Ok(());
            };
            println!("\n{}\n", article.title);
            println!("   by {} · tags: {}", article.author.username, article.tags.join(", "));
            println!("   {}\n", article.description);
            println!("{}\n", article.body);
            for comment in &article.comments {
                println!("💬 {} ({}): {}", comment.author.username, comment.id, comment.body);
            }
        }
        Commands::Post {
            username,
            title,
            description,
            body,
            tags,
        } => {
            let request = client.authorized(client.http.post(client.url("/articles")))?;
            let response = request
                .json(&json!({
                    "username": username,
                    "title": title,
                    "description": description,
                    "body": body,
                    "tags": tags,
                }))
                .send()
                .await?;
            let result: ArticleEnvelope = parse(response).await?;
            println!("✅ Published {}", result.article.slug);
        }
        Commands::Delete { slug } => {
            let request = client.authorized(client.http.delete(client.url(&format!("/articles/{slug}"))))?;
            let result: MessageResponse = parse(request.send().await?).await?;
            println!("✅ {}", result.message);
        }
        Commands::Comment { slug, body } => {
            let request = client.authorized(client.http.post(client.url(&format!("/articles/{slug}/comments"))))?;
            let response = request.json(&json!({ "body": body })).send().await?;
            let result: CommentEnvelope = parse(response).await?;
            println!("✅ Comment {} added to {}", result.comment.id, result.comment.article.slug);
        }
        Commands::Comments { slug } => {
            let response = client
                .http
                .get(client.url(&format!("/articles/{slug}/comments")))
                .send()
                .await?;
            let result: CommentListResponse = parse(response).await?;
            print_comments(&result);
        }
        Commands::Uncomment { slug, id } => {
            let request = client.authorized(
                client
                    .http
                    .delete(client.url(&format!("/articles/{slug}/comments/{id}"))),
            )?;
            let result: MessageResponse = parse(request.send().await?).await?;
            println!("✅ {}", result.message);
        }
    }
    Ok(())
}

fn print_articles(result: &ArticleListResponse) {
    if result.articles.is_empty() {
        println!("📭 No articles found.");
        return;
    }

    println!("\n📋 Articles ({})\n", result.articles.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Slug"),
        Cell::new("Title"),
        Cell::new("Author"),
        Cell::new("Tags"),
        Cell::new("Comments"),
        Cell::new("Created"),
    ]));

    for article in &result.articles {
        let created = article.created_at.with_timezone(&Local);
        table.add_row(Row::new(vec![
            Cell::new(&article.slug),
            Cell::new(&article.title),
            Cell::new(&article.author.username),
            Cell::new(&article.tags.join(", ")),
            Cell::new(&article.comments.len().to_string()),
            Cell::new(&created.format("%Y-%m-%d %H:%M").to_string()),
        ]));
    }

    table.printstd();
    println!();
}

fn print_comments(result: &CommentListResponse) {
    if result.comments.is_empty() {
        println!("📭 No comments yet.");
        return;
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("ID"), Cell::new("Author"), Cell::new("Comment")]));

    for comment in &result.comments {
        table.add_row(Row::new(vec![
            Cell::new(&comment.id.to_string()),
            Cell::new(&comment.author.username),
            Cell::new(&comment.body),
        ]));
    }

    table.printstd();
    println!();
}
