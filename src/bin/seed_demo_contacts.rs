// ABOUTME: Demo data seeder for local development
// ABOUTME: Creates sample contacts with chat history and canned analysis results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Demo Contact Seeder
//!
//! Populates the database with sample contacts, chat lines spread over the
//! recent weeks, and pre-written analysis results, so the API has realistic
//! data to browse without calling the upstream model.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use serde_json::json;
use tracing::info;

use rapport_server::{
    config::ServerConfig,
    database::{Database, NewChatLine},
    llm::{AnalysisDocument, NormalizedAnalysis},
    logging,
};

#[derive(Parser)]
#[command(name = "seed-demo-contacts")]
#[command(about = "Seed the Rapport database with demo contacts")]
pub struct Args {
    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,
}

struct DemoLine {
    speaker: &'static str,
    content: &'static str,
    days_ago: i64,
}

struct DemoContact {
    name: &'static str,
    notes: &'static str,
    tags: &'static str,
    lines: Vec<DemoLine>,
    analysis: Option<NormalizedAnalysis>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let config = ServerConfig::from_env()?;
    let database_url = args.database_url.unwrap_or(config.database_url);

    let database = Database::new(&database_url).await?;
    info!("Seeding demo contacts into {database_url}");

    let mut contact_count = 0usize;
    for demo in demo_contacts() {
        let contact = database
            .contacts()
            .create(demo.name, None, demo.notes, demo.tags)
            .await?;

        // Group lines by date so each append shares one chat_date
        let mut by_day: Vec<(i64, Vec<NewChatLine>)> = Vec::new();
        for line in &demo.lines {
            let index = by_day
                .iter()
                .position(|(day, _)| *day == line.days_ago)
                .unwrap_or_else(|| {
                    by_day.push((line.days_ago, Vec::new()));
                    by_day.len() - 1
                });
            by_day[index].1.push(NewChatLine {
                speaker: line.speaker.to_owned(),
                content: line.content.to_owned(),
            });
        }

        for (days_ago, lines) in by_day {
            let chat_date = (Utc::now().date_naive() - Duration::days(days_ago))
                .format("%Y-%m-%d")
                .to_string();
            database
                .chat_lines()
                .append_lines(contact.id, &chat_date, &lines)
                .await?;
        }

        if let Some(analysis) = &demo.analysis {
            database.analysis().upsert(contact.id, analysis).await?;
        }

        contact_count += 1;
        info!(
            contact = demo.name,
            lines = demo.lines.len(),
            has_analysis = demo.analysis.is_some(),
            "Seeded contact"
        );
    }

    info!("Done: seeded {contact_count} demo contacts");
    Ok(())
}

fn canned_analysis(document: AnalysisDocument) -> NormalizedAnalysis {
    NormalizedAnalysis {
        raw_response: serde_json::to_string(&document).unwrap_or_default(),
        document,
        usage: rapport_server::llm::UsageTotals::default(),
    }
}

#[allow(clippy::too_many_lines)]
fn demo_contacts() -> Vec<DemoContact> {
    vec![
        DemoContact {
            name: "张明",
            notes: "大学室友，现在在互联网公司做产品经理",
            tags: "朋友,大学同学",
            lines: vec![
                DemoLine { speaker: "张明", content: "周末有空吗？一起出来吃个饭啊", days_ago: 3 },
                DemoLine { speaker: "我", content: "好啊，去哪儿吃？", days_ago: 3 },
                DemoLine { speaker: "张明", content: "我知道一家新开的火锅店，味道超棒", days_ago: 3 },
                DemoLine { speaker: "我", content: "行啊，那就周六晚上吧", days_ago: 3 },
                DemoLine { speaker: "张明", content: "对了，你最近工作怎么样？", days_ago: 5 },
                DemoLine { speaker: "我", content: "还行吧，就是项目赶得比较紧", days_ago: 5 },
                DemoLine { speaker: "张明", content: "保重身体啊，别太拼了", days_ago: 5 },
                DemoLine { speaker: "我", content: "知道啦，你也是", days_ago: 5 },
                DemoLine { speaker: "张明", content: "上周看的那部电影怎么样？", days_ago: 7 },
                DemoLine { speaker: "我", content: "挺好看的，剧情很紧凑", days_ago: 7 },
                DemoLine { speaker: "张明", content: "我也想去看，等有空约一个", days_ago: 7 },
            ],
            analysis: Some(canned_analysis(AnalysisDocument {
                core_traits: json!({
                    "rationality": "做事有计划，但也不失灵活性",
                    "introversion": "偏外向，喜欢社交和聚会",
                    "planning": "习惯提前规划，但也能随性应对变化",
                    "responsibility": "对朋友真诚，答应的事会做到",
                    "stress_resistance": "心态较好，能合理调节压力",
                    "decision_style": "偏向民主协商，会听取他人意见"
                }),
                behavior_preferences: json!({
                    "high_frequency_topics": ["电影", "美食", "工作", "聚会"],
                    "interests": ["美食探店", "电影", "运动"],
                    "hobbies": ["篮球", "看剧"],
                    "preferences": "喜欢新鲜事物，热衷于探索新店",
                    "avoidances": "不太喜欢太正式的场合",
                    "lifestyle": "工作之余注重生活品质，周末喜欢放松"
                }),
                social_interaction: json!({
                    "initiative": "经常主动发起邀约，维护朋友关系",
                    "expression_style": "说话直接热情，善于表达",
                    "response_pattern": "回复及时，互动积极",
                    "empathy": "能理解朋友的处境和感受",
                    "sharing_willingness": "乐于分享生活和经历",
                    "boundary_awareness": "尊重他人边界，不过度干涉",
                    "collaboration_style": "配合度高，善于协调"
                }),
                cognitive_thinking: json!({
                    "knowledge_depth": "知识面广但不精",
                    "knowledge_breadth": "对生活娱乐类信息关注较多",
                    "values": "重视友情和生活平衡",
                    "principles": "为人正直，重承诺"
                }),
                summary: "热情开朗的生活家，善于维护社交关系".to_owned(),
                interests: json!(["美食", "电影", "篮球", "旅行", "音乐"]),
                dos_and_donts: json!({
                    "dos": ["约他尝试新餐厅", "周末一起看电影", "聊生活话题"],
                    "donts": ["让他做太正式的决定", "忽视他的邀约"]
                }),
                topic_suggestions: json!([
                    "最近上映的电影",
                    "新开的餐厅或美食",
                    "周末活动安排",
                    "工作近况",
                    "篮球或运动相关"
                ]),
                gift_suggestions: json!(["电影票或演出票", "运动装备", "美食礼券"]),
            })),
        },
        DemoContact {
            name: "李雪",
            notes: "合作过两个项目的设计师，审美在线",
            tags: "同事,设计师",
            lines: vec![
                DemoLine { speaker: "我", content: "那个项目的设计稿什么时候能给我？", days_ago: 2 },
                DemoLine { speaker: "李雪", content: "大概周四能完成，这两天在赶另一个需求", days_ago: 2 },
                DemoLine { speaker: "我", content: "好的，不急，质量第一", days_ago: 2 },
                DemoLine { speaker: "李雪", content: "谢谢理解！对了，我最近在学水彩画", days_ago: 4 },
                DemoLine { speaker: "我", content: "哇，好厉害！能看看你的作品吗", days_ago: 4 },
                DemoLine { speaker: "李雪", content: "还在练习阶段，等有成品了分享给你", days_ago: 4 },
                DemoLine { speaker: "我", content: "太期待了，感觉你做什么都很认真", days_ago: 4 },
            ],
            analysis: Some(canned_analysis(AnalysisDocument {
                core_traits: json!({
                    "rationality": "感性与理性平衡，审美驱动但交付可靠",
                    "introversion": "偏内向，熟悉后健谈",
                    "planning": "对工作节奏有清晰安排",
                    "responsibility": "对交付质量要求高",
                    "stress_resistance": "多任务下仍能保持稳定输出",
                    "decision_style": "倾向深思熟虑后再承诺"
                }),
                behavior_preferences: json!({
                    "high_frequency_topics": ["设计", "绘画", "项目协作"],
                    "interests": ["水彩画", "视觉设计"],
                    "hobbies": ["画画", "逛展"],
                    "preferences": "喜欢被认可专业价值",
                    "avoidances": "反感无理由的催促",
                    "lifestyle": "工作之外持续学习新技能"
                }),
                social_interaction: json!({
                    "initiative": "工作沟通主动，生活分享选择性",
                    "expression_style": "温和礼貌，表达克制",
                    "response_pattern": "回复认真，节奏稍慢",
                    "empathy": "能体谅协作方的处境",
                    "sharing_willingness": "熟人面前愿意分享爱好",
                    "boundary_awareness": "边界感强",
                    "collaboration_style": "注重质量的可靠协作者"
                }),
                cognitive_thinking: json!({
                    "knowledge_depth": "设计领域专业度高",
                    "knowledge_breadth": "对艺术类信息广泛涉猎",
                    "values": "重视专业成长与作品质量",
                    "principles": "答应的交付一定完成"
                }),
                summary: "认真可靠的设计师，低调而有追求".to_owned(),
                interests: json!(["水彩画", "设计", "艺术展", "手帐"]),
                dos_and_donts: json!({
                    "dos": ["认可她的专业判断", "聊艺术和设计话题"],
                    "donts": ["压缩她的交付时间", "否定她的审美"]
                }),
                topic_suggestions: json!(["最近的展览", "水彩画进展", "设计趋势"]),
                gift_suggestions: json!(["画材套装", "艺术画册"]),
            })),
        },
        DemoContact {
            name: "王强",
            notes: "健身房认识的朋友，聊得来",
            tags: "朋友,健身",
            lines: vec![
                DemoLine { speaker: "王强", content: "今晚去撸铁吗？", days_ago: 1 },
                DemoLine { speaker: "我", content: "去，七点老地方见", days_ago: 1 },
                DemoLine { speaker: "王强", content: "行，今天练背", days_ago: 1 },
                DemoLine { speaker: "王强", content: "上次说的蛋白粉我买了，确实不错", days_ago: 6 },
                DemoLine { speaker: "我", content: "哈哈就说吧，性价比很高", days_ago: 6 },
            ],
            // Left unanalyzed so the demo has a contact showing the
            // pre-analysis state
            analysis: None,
        },
    ]
}
